// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket adapter for [`RequestContext`]

use std::convert::Infallible;

use rocket::request::{self, FromRequest, Request};

use crate::claims::{ClaimMap, RequestContext, RequestParts};
use crate::scope::split_scope_list;

/// Identity header set by the authenticating reverse proxy
pub const AUTHENTICATED_USER_HEADER: &str = "X-Authenticated-User";

/// Header carrying additional space-delimited scopes
pub const SCOPE_HEADER: &str = "X-Registry-Scope";

/// Snapshot of the parts of a Rocket request used by claim assembly
///
/// The guard never fails; handlers decide what a missing identity means.
#[derive(Debug, Clone)]
pub struct HttpRequestContext {
    parts: RequestParts,
    authenticated_user: Option<String>,
    header_scopes: Vec<String>,
}

impl HttpRequestContext {
    pub fn from_rocket(request: &Request<'_>) -> Self {
        let mut parts = RequestParts::new(request.method().as_str());
        if let Some(query) = request.uri().query() {
            for (name, value) in query.segments() {
                parts.query.push((name.to_string(), value.to_string()));
            }
        }
        parts.content_type_json = request
            .content_type()
            .map(|content_type| content_type.is_json())
            .unwrap_or(false);

        let authenticated_user = request
            .headers()
            .get_one(AUTHENTICATED_USER_HEADER)
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(str::to_string);

        let header_scopes = request
            .headers()
            .get(SCOPE_HEADER)
            .flat_map(split_scope_list)
            .collect();

        HttpRequestContext {
            parts,
            authenticated_user,
            header_scopes,
        }
    }

    /// Attach the request body read by a data guard
    ///
    /// Required before resolving `$.body.<key>` selectors against this context.
    pub fn with_body(mut self, body: String) -> Self {
        self.parts.body = Some(body);
        self
    }

    /// See [`RequestParts::json_object`]
    pub fn json_object(&self) -> Option<ClaimMap> {
        self.parts.json_object()
    }

    pub fn authenticated_user(&self) -> Option<&str> {
        self.authenticated_user.as_deref()
    }

    /// Query `scope` values, each split on whitespace, followed by the
    /// header scopes; duplicates are kept
    pub fn requested_scopes(&self) -> Vec<String> {
        self.parts
            .query_values("scope")
            .iter()
            .flat_map(|scope| split_scope_list(scope))
            .chain(self.header_scopes.iter().cloned())
            .collect()
    }
}

impl RequestContext for HttpRequestContext {
    fn query_param(&self, name: &str) -> Option<String> {
        self.parts.query_param(name)
    }

    fn json_body(&self) -> ClaimMap {
        self.parts.json_body()
    }

    fn method(&self) -> String {
        self.parts.method()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for HttpRequestContext {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        request::Outcome::Success(HttpRequestContext::from_rocket(request))
    }
}

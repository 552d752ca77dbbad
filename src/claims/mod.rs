// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Claim assembly
//!
//! Endpoints describe the claims they want as a [`ClaimMapping`]: an ordered
//! list of claim names, each with a [`Resolver`] saying where the value comes
//! from. [`ClaimBuilder::build`] resolves every entry against the current
//! request and returns a [`ClaimMap`].
//!
//! Resolvers are classified once, when the mapping is built:
//!
//! - `"$.query.<key>"` reads a single query parameter
//! - `"$.body.<key>"` reads a field of the JSON request body
//! - a closure computes the value from the request
//! - anything else, including strings with an unknown `$.` prefix, is a literal
//!
//! Entries are independent of each other; a resolver never sees the value
//! produced for another claim.

pub mod service_account;

pub use service_account::build_service_account_claims;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, TokenError};

/// Claim name to JSON value
pub type ClaimMap = serde_json::Map<String, Value>;

/// `exp` for a token issued at `iat` that lives `ttl_seconds`
///
/// Fails instead of wrapping when the lifetime does not fit a timestamp.
pub fn expiry_timestamp(iat: i64, ttl_seconds: u64) -> Result<i64> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(|ttl| iat.checked_add(ttl))
        .ok_or_else(|| {
            TokenError::configuration(format!(
                "token lifetime of {} seconds is out of range",
                ttl_seconds
            ))
        })
}

const QUERY_PREFIX: &str = "$.query.";
const BODY_PREFIX: &str = "$.body.";

/// The three request capabilities claim resolution depends on
///
/// Each HTTP framework provides an adapter; the assembler never sees the
/// framework's own request type.
pub trait RequestContext {
    /// Single query parameter, first occurrence wins
    fn query_param(&self, name: &str) -> Option<String>;

    /// JSON object body, empty when absent, not JSON, or not an object
    fn json_body(&self) -> ClaimMap;

    /// HTTP verb, upper case
    fn method(&self) -> String;
}

/// Framework-independent request snapshot
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    pub method: String,
    pub query: Vec<(String, String)>,
    pub content_type_json: bool,
    pub body: Option<String>,
}

impl RequestParts {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_json_body(mut self, body: impl Into<String>) -> Self {
        self.content_type_json = true;
        self.body = Some(body.into());
        self
    }

    /// Body parsed as a JSON object
    ///
    /// `None` unless the content type is JSON and the body is an object,
    /// which lets callers tell `{}` apart from an unusable body.
    pub fn json_object(&self) -> Option<ClaimMap> {
        if !self.content_type_json {
            return None;
        }
        match serde_json::from_str::<Value>(self.body.as_deref()?).ok()? {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Every value of a repeated query parameter, in order
    pub fn query_values(&self, name: &str) -> Vec<String> {
        self.query
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .collect()
    }
}

impl RequestContext for RequestParts {
    fn query_param(&self, name: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn json_body(&self) -> ClaimMap {
        self.json_object().unwrap_or_default()
    }

    fn method(&self) -> String {
        self.method.to_uppercase()
    }
}

/// Signature of a computed claim
pub type ComputeFn = dyn Fn(&dyn RequestContext) -> Value + Send + Sync;

/// Where a claim value comes from
#[derive(Clone)]
pub enum Resolver {
    /// Value used as-is, including nested lists and objects
    Literal(Value),
    /// `$.query.<key>`
    QueryRef(String),
    /// `$.body.<key>`
    BodyRef(String),
    /// Value computed from the request
    Computed(Arc<ComputeFn>),
}

impl Resolver {
    /// Classify a declarative mapping value
    pub fn selector(value: impl Into<Value>) -> Self {
        let value = value.into();
        if let Value::String(selector) = &value {
            if let Some(key) = selector.strip_prefix(QUERY_PREFIX) {
                return Resolver::QueryRef(key.to_string());
            }
            if let Some(key) = selector.strip_prefix(BODY_PREFIX) {
                return Resolver::BodyRef(key.to_string());
            }
        }
        Resolver::Literal(value)
    }

    pub fn computed<F>(compute: F) -> Self
    where
        F: Fn(&dyn RequestContext) -> Value + Send + Sync + 'static,
    {
        Resolver::Computed(Arc::new(compute))
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolver::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Resolver::QueryRef(key) => f.debug_tuple("QueryRef").field(key).finish(),
            Resolver::BodyRef(key) => f.debug_tuple("BodyRef").field(key).finish(),
            Resolver::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

/// Ordered claim name to resolver table
#[derive(Debug, Clone, Default)]
pub struct ClaimMapping {
    entries: Vec<(String, Resolver)>,
}

impl ClaimMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, claim: impl Into<String>, resolver: Resolver) -> Self {
        self.entries.push((claim.into(), resolver));
        self
    }

    /// Shorthand for [`Resolver::selector`]
    pub fn select(self, claim: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(claim, Resolver::selector(value))
    }

    /// Shorthand for [`Resolver::computed`]
    pub fn compute<F>(self, claim: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&dyn RequestContext) -> Value + Send + Sync + 'static,
    {
        self.with(claim, Resolver::computed(compute))
    }

    pub fn entries(&self) -> &[(String, Resolver)] {
        &self.entries
    }
}

/// Resolves a [`ClaimMapping`] against a request
#[derive(Debug, Default, Clone, Copy)]
pub struct ClaimBuilder;

impl ClaimBuilder {
    pub fn build(&self, request: &dyn RequestContext, mapping: &ClaimMapping) -> ClaimMap {
        let mut body: Option<ClaimMap> = None;
        let mut claims = ClaimMap::new();

        for (claim, resolver) in mapping.entries() {
            let value = match resolver {
                Resolver::Literal(value) => value.clone(),
                Resolver::QueryRef(key) => request
                    .query_param(key)
                    .map(Value::String)
                    .unwrap_or(Value::Null),
                Resolver::BodyRef(key) => body
                    .get_or_insert_with(|| request.json_body())
                    .get(key)
                    .cloned()
                    .unwrap_or(Value::Null),
                Resolver::Computed(compute) => compute(request),
            };
            claims.insert(claim.clone(), value);
        }

        claims
    }
}

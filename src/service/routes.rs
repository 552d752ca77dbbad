// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Token endpoints

use chrono::{Duration, SecondsFormat, Utc};
use log::{debug, info};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, State};
use serde::Deserialize;
use serde_json::{json, Value};

use super::context::HttpRequestContext;
use super::error::ApiError;
use super::server::ServicePolicy;
use crate::claims::{
    build_service_account_claims, ClaimBuilder, ClaimMap, ClaimMapping, RequestContext, Resolver,
};
use crate::jwt::TokenIssuer;
use crate::policy::access_value;
use crate::scope::{format_scopes, parse_scopes};

const REGISTRY_SERVICE: &str = "docker-registry";
const TOKEN_REQUEST_API_VERSION: &str = "authentication.k8s.io/v1";

/// Readiness probe
#[get("/healthz")]
pub fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Issue a generic token whose custom claims are the JSON object body
#[post("/auth", data = "<body>")]
pub fn auth(
    request: HttpRequestContext,
    body: String,
    issuer: &State<TokenIssuer>,
) -> Result<Json<Value>, ApiError> {
    let Some(claims) = request.with_body(body).json_object() else {
        return Err(ApiError::bad_request("invalid json"));
    };

    let token = issuer.issue(claims.clone())?;
    Ok(Json(json!({ "token": token, "claims": claims })))
}

#[get("/auth")]
pub fn auth_method_not_allowed() -> ApiError {
    ApiError::new(Status::MethodNotAllowed, "method not allowed")
}

/// Docker registry token endpoint
///
/// The caller identity comes from the `X-Authenticated-User` header set by
/// the authenticating proxy. Requested scopes are filtered through the policy
/// when one is configured.
#[get("/v2/token")]
pub fn registry_token(
    request: HttpRequestContext,
    issuer: &State<TokenIssuer>,
    policy: &State<ServicePolicy>,
) -> Result<Json<Value>, ApiError> {
    let Some(user) = request.authenticated_user().map(str::to_string) else {
        return Err(ApiError::unauthenticated());
    };

    let requested = request.requested_scopes();
    let requested_scope = if requested.is_empty() {
        Value::Null
    } else {
        Value::String(requested.join(" "))
    };

    let mapping = ClaimMapping::new()
        .select("service", REGISTRY_SERVICE)
        .with("scope", Resolver::Literal(requested_scope))
        .select("account", "$.query.account");
    let mut claims = ClaimBuilder.build(&request, &mapping);

    let access = match policy.source() {
        Some(source) => {
            let access = source.load()?.allowed_access(&user, &requested);
            claims.insert("scope".to_string(), json!(format_scopes(&access)));
            access
        }
        None => parse_scopes(&requested),
    };
    debug!(
        "User '{}' requested {} scope(s), granted {}",
        user,
        requested.len(),
        access.len()
    );
    claims.insert("access".to_string(), access_value(&access));
    claims.insert("sub".to_string(), json!(user));

    if let Some(service) = request.query_param("service").filter(|s| !s.is_empty()) {
        claims.insert("aud".to_string(), json!(service));
    }

    let now = Utc::now();
    let token = issuer.issue_at(claims.clone(), now)?;
    info!("Issued registry token for '{}'", user);

    Ok(Json(json!({
        "token": token,
        "access_token": token,
        "expires_in": issuer.ttl_seconds(),
        "issued_at": now.to_rfc3339_opts(SecondsFormat::Secs, false),
        "nbf": now.timestamp(),
        "claims": claims,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequestSpec {
    #[serde(default)]
    audiences: Vec<String>,
    #[serde(default)]
    expiration_seconds: Option<u64>,
}

/// Kubernetes `TokenRequest` for a ServiceAccount
#[post(
    "/apis/authentication.k8s.io/v1/namespaces/<namespace>/serviceaccounts/<name>/token",
    data = "<body>"
)]
pub fn service_account_token(
    namespace: &str,
    name: &str,
    request: HttpRequestContext,
    body: String,
    issuer: &State<TokenIssuer>,
) -> Result<Json<Value>, ApiError> {
    let request = request.with_body(body);
    let mapping = ClaimMapping::new().select("spec", "$.body.spec");
    let spec = match ClaimBuilder.build(&request, &mapping).remove("spec") {
        None | Some(Value::Null) => TokenRequestSpec::default(),
        Some(spec) => serde_json::from_value::<TokenRequestSpec>(spec).map_err(|err| {
            ApiError::bad_request(format!("invalid TokenRequest spec: {}", err))
        })?,
    };

    let audiences = spec.audiences;
    if audiences.is_empty() {
        return Err(ApiError::bad_request(
            "spec.audiences must be a non-empty list",
        ));
    }

    let ttl = spec
        .expiration_seconds
        .filter(|seconds| *seconds > 0)
        .unwrap_or_else(|| issuer.ttl_seconds());

    let now = Utc::now();
    let expires_at = i64::try_from(ttl)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| ApiError::bad_request("spec.expirationSeconds is out of range"))?;

    let claims: ClaimMap =
        build_service_account_claims(namespace, name, &audiences, issuer.config(), now, ttl)?;
    let token = issuer.sign_claims(&claims)?;
    info!(
        "Issued TokenRequest for system:serviceaccount:{}:{}",
        namespace, name
    );

    Ok(Json(json!({
        "apiVersion": TOKEN_REQUEST_API_VERSION,
        "kind": "TokenRequest",
        "metadata": { "name": name, "namespace": namespace },
        "spec": { "audiences": audiences, "expirationSeconds": ttl },
        "status": {
            "token": token,
            "expirationTimestamp": expires_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        },
    })))
}

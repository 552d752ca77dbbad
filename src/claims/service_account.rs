// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Claim shape of a Kubernetes `TokenRequest`

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{expiry_timestamp, ClaimMap};
use crate::config::IssuerConfig;
use crate::error::Result;

/// Build the claims of a projected ServiceAccount token
///
/// `aud` stays a list even with a single audience. The caller rejects an
/// empty `audiences` before getting here. Fails with a configuration error
/// when `ttl_seconds` overflows the expiry timestamp.
pub fn build_service_account_claims(
    namespace: &str,
    service_account_name: &str,
    audiences: &[String],
    config: &IssuerConfig,
    now: DateTime<Utc>,
    ttl_seconds: u64,
) -> Result<ClaimMap> {
    let iat = now.timestamp();
    let exp = expiry_timestamp(iat, ttl_seconds)?;

    let mut claims = ClaimMap::new();
    claims.insert(
        "sub".to_string(),
        Value::String(format!(
            "system:serviceaccount:{}:{}",
            namespace, service_account_name
        )),
    );
    claims.insert("aud".to_string(), json!(audiences));
    claims.insert("iss".to_string(), json!(config.issuer_name()));
    claims.insert("iat".to_string(), json!(iat));
    claims.insert("exp".to_string(), json!(exp));
    claims.insert(
        "kubernetes.io".to_string(),
        json!({
            "namespace": namespace,
            "serviceaccount": { "name": service_account_name },
        }),
    );
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ISSUER;
    use crate::error::TokenError;
    use chrono::TimeZone;

    fn audiences(values: &[&str]) -> Vec<String> {
        values.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_service_account_claims() {
        let config = IssuerConfig {
            issuer: Some("https://custom-issuer.io".to_string()),
            ..Default::default()
        };
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let claims = build_service_account_claims(
            "prod",
            "api-server",
            &audiences(&["https://k8s.default.svc"]),
            &config,
            now,
            600,
        )
        .unwrap();

        assert_eq!(claims["sub"], json!("system:serviceaccount:prod:api-server"));
        assert_eq!(claims["aud"], json!(["https://k8s.default.svc"]));
        assert_eq!(claims["iss"], json!("https://custom-issuer.io"));
        assert_eq!(claims["kubernetes.io"]["namespace"], json!("prod"));
        assert_eq!(claims["kubernetes.io"]["serviceaccount"]["name"], json!("api-server"));
        assert_eq!(claims["iat"], json!(now.timestamp()));
        assert_eq!(
            claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
            600
        );
        assert_eq!(claims.len(), 6);
    }

    #[test]
    fn test_default_issuer_and_audience_order() {
        let claims = build_service_account_claims(
            "ns",
            "sa",
            &audiences(&["a", "b", "c"]),
            &IssuerConfig::default(),
            Utc::now(),
            3600,
        )
        .unwrap();
        assert_eq!(claims["iss"], json!(DEFAULT_ISSUER));
        assert_eq!(claims["aud"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_lifetime_overflow_is_an_error() {
        let result = build_service_account_claims(
            "ns",
            "sa",
            &audiences(&["a"]),
            &IssuerConfig::default(),
            Utc::now(),
            u64::MAX,
        );
        assert!(matches!(result, Err(TokenError::Configuration { .. })));
    }
}

// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use jsonwebtoken::{decode, DecodingKey, Validation};

use super::keys::{decoding_key, SigningAlgorithm};
use crate::claims::ClaimMap;
use crate::config::IssuerConfig;
use crate::error::{Result, TokenError};

/// A validator for tokens produced by [`super::TokenIssuer`]
///
/// Checks the signature, the algorithm, `exp`, `nbf` and the audience. The
/// expected audience defaults to the configured one.
pub struct TokenValidator {
    verification_key: DecodingKey,
    algorithm: SigningAlgorithm,
    expected_audience: String,
    expected_issuer: Option<String>,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("verification_key", &"<DecodingKey>")
            .field("algorithm", &self.algorithm)
            .field("expected_audience", &self.expected_audience)
            .field("expected_issuer", &self.expected_issuer)
            .finish()
    }
}

impl TokenValidator {
    /// Load the verification key described by `config`
    pub fn new(config: &IssuerConfig) -> Result<Self> {
        let algorithm = config.algorithm.parse::<SigningAlgorithm>()?;
        Ok(TokenValidator {
            verification_key: decoding_key(config, algorithm)?,
            algorithm,
            expected_audience: config.audience_name().to_string(),
            expected_issuer: None,
        })
    }

    /// Expect a different audience, e.g. a `TokenRequest` audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected_audience = audience.into();
        self
    }

    /// Also require the `iss` claim
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    /// Validate a token and return its claims
    pub fn validate(&self, token: &str) -> Result<ClaimMap> {
        let mut validation = Validation::new(self.algorithm.jwt_algorithm());
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_audience(&[&self.expected_audience]);

        if let Some(ref issuer) = self.expected_issuer {
            validation.set_issuer(&[issuer]);
        }

        let token_data = decode::<ClaimMap>(token, &self.verification_key, &validation)
            .map_err(|source| TokenError::Verification { source })?;

        Ok(token_data.claims)
    }
}

/// Verify `token` against `config` and return its claims
pub fn decode_token(config: &IssuerConfig, token: &str) -> Result<ClaimMap> {
    TokenValidator::new(config)?.validate(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{issue_token, TokenIssuer};
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn config() -> IssuerConfig {
        IssuerConfig {
            hs256_secret: Some("abc123".to_string()),
            issuer: Some("i".to_string()),
            audience: Some("a".to_string()),
            default_ttl_seconds: 60,
            ..Default::default()
        }
    }

    #[test]
    fn test_round_trip() {
        let mut claims = ClaimMap::new();
        claims.insert("sub".to_string(), json!("foo"));
        claims.insert("access".to_string(), json!([{"type": "repository"}]));

        let token = issue_token(&config(), claims.clone()).unwrap();
        let decoded = decode_token(&config(), &token).unwrap();

        assert_eq!(decoded["sub"], json!("foo"));
        assert_eq!(decoded["access"], claims["access"]);
        assert_eq!(decoded["iss"], json!("i"));
        assert_eq!(
            decoded["exp"].as_i64().unwrap() - decoded["iat"].as_i64().unwrap(),
            60
        );
    }

    #[test]
    fn test_wrong_secret_fails() {
        let token = issue_token(&config(), ClaimMap::new()).unwrap();
        let mut other = config();
        other.hs256_secret = Some("different".to_string());
        assert!(matches!(
            decode_token(&other, &token),
            Err(TokenError::Verification { .. })
        ));
    }

    #[test]
    fn test_audience_mismatch_fails() {
        let token = issue_token(&config(), ClaimMap::new()).unwrap();
        let mut other = config();
        other.audience = Some("someone-else".to_string());
        assert!(matches!(
            decode_token(&other, &token),
            Err(TokenError::Verification { .. })
        ));
    }

    #[test]
    fn test_expired_token_fails() {
        let issuer = TokenIssuer::new(config()).unwrap();
        let token = issuer
            .issue_at(ClaimMap::new(), Utc::now() - Duration::hours(2))
            .unwrap();
        assert!(matches!(
            decode_token(&config(), &token),
            Err(TokenError::Verification { .. })
        ));
    }

    #[test]
    fn test_issuer_check() {
        let token = issue_token(&config(), ClaimMap::new()).unwrap();
        let validator = TokenValidator::new(&config()).unwrap();
        assert!(validator.validate(&token).is_ok());
        let validator = TokenValidator::new(&config()).unwrap().with_issuer("other");
        assert!(validator.validate(&token).is_err());
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(
            decode_token(&config(), "not.a.token"),
            Err(TokenError::Verification { .. })
        ));
    }
}

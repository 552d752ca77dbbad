// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Token issuance
//!
//! [`TokenIssuer::issue`] builds the generic payload
//!
//! ```text
//! iss, aud, iat, nbf, exp      registered claims
//! ...static_claims             from the configuration
//! ...custom claims             filtered by allowed_custom_claims
//! ```
//!
//! where later sources override earlier ones on key collision, then signs it.
//! [`TokenIssuer::sign_claims`] signs a payload assembled elsewhere, such as
//! the Kubernetes `TokenRequest` shape, with the same header and key.

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Header};
use log::debug;
use serde_json::json;

use super::keys::{encoding_key, load_x5c_chain, SigningAlgorithm};
use crate::claims::{expiry_timestamp, ClaimMap};
use crate::config::IssuerConfig;
use crate::error::{Result, TokenError};

/// Signs tokens according to an [`IssuerConfig`]
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    config: IssuerConfig,
    algorithm: SigningAlgorithm,
}

impl TokenIssuer {
    /// Create an issuer, failing on an unsupported algorithm
    ///
    /// Key material is resolved on every signature, not here.
    pub fn new(config: IssuerConfig) -> Result<Self> {
        let algorithm = config.algorithm.parse::<SigningAlgorithm>()?;
        Ok(Self { config, algorithm })
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Token lifetime in seconds
    pub fn ttl_seconds(&self) -> u64 {
        self.config.default_ttl_seconds
    }

    /// Issue a token valid from now
    pub fn issue(&self, custom_claims: ClaimMap) -> Result<String> {
        self.issue_at(custom_claims, Utc::now())
    }

    /// Issue a token whose `iat` and `nbf` are `now`
    pub fn issue_at(&self, custom_claims: ClaimMap, now: DateTime<Utc>) -> Result<String> {
        let claims = self.payload(custom_claims, now)?;
        self.sign_claims(&claims)
    }

    /// Assemble the generic payload without signing it
    pub fn payload(&self, custom_claims: ClaimMap, now: DateTime<Utc>) -> Result<ClaimMap> {
        let iat = now.timestamp();
        let exp = expiry_timestamp(iat, self.ttl_seconds())?;

        let mut claims = ClaimMap::new();
        claims.insert("iss".to_string(), json!(self.config.issuer_name()));
        claims.insert("aud".to_string(), json!(self.config.audience_name()));
        claims.insert("iat".to_string(), json!(iat));
        claims.insert("nbf".to_string(), json!(iat));
        claims.insert("exp".to_string(), json!(exp));

        for (name, value) in &self.config.static_claims {
            claims.insert(name.clone(), value.clone());
        }
        for (name, value) in self.filter_custom_claims(custom_claims) {
            claims.insert(name, value);
        }

        Ok(claims)
    }

    /// Sign an already assembled payload with the configured header and key
    pub fn sign_claims(&self, claims: &ClaimMap) -> Result<String> {
        let header = self.header()?;
        let key = encoding_key(&self.config, self.algorithm)?;

        debug!(
            "Signing token with {} ({} claims)",
            self.algorithm,
            claims.len()
        );
        encode(&header, claims, &key).map_err(|source| TokenError::Signing { source })
    }

    /// Apply `allowed_custom_claims`; an empty allow-list drops everything
    fn filter_custom_claims(&self, custom_claims: ClaimMap) -> ClaimMap {
        match &self.config.allowed_custom_claims {
            None => custom_claims,
            Some(allowed) => custom_claims
                .into_iter()
                .filter(|(name, _)| {
                    let keep = allowed.iter().any(|a| a == name);
                    if !keep {
                        debug!("Dropping custom claim '{}' not in allow-list", name);
                    }
                    keep
                })
                .collect(),
        }
    }

    fn header(&self) -> Result<Header> {
        let mut header = Header::new(self.algorithm.jwt_algorithm());
        header.typ = Some("JWT".to_string());
        header.kid = self.config.key_id.clone();

        if self.algorithm == SigningAlgorithm::RS256 {
            if let Some(path) = &self.config.x5c_chain_path {
                let chain = load_x5c_chain(path)?;
                if !chain.is_empty() {
                    header.x5c = Some(chain);
                }
            }
        }

        Ok(header)
    }
}

/// Issue a generic token for `config` in a single call
pub fn issue_token(config: &IssuerConfig, custom_claims: ClaimMap) -> Result<String> {
    TokenIssuer::new(config.clone())?.issue(custom_claims)
}

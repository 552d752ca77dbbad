// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Token issuer settings
//!
//! These keys live at the top level of the configuration file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::claims::ClaimMap;

/// Issuer used when `issuer` is not configured
pub const DEFAULT_ISSUER: &str = "https://keypebble.local";

/// Audience used when `audience` is not configured
pub const DEFAULT_AUDIENCE: &str = "keypebble";

/// Token lifetime used when `default_ttl_seconds` is not configured
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Upper bound accepted for `default_ttl_seconds` (ten years)
pub const MAX_TTL_SECONDS: u64 = 315_360_000;

/// Signing algorithm used when `algorithm` is not configured
pub const DEFAULT_ALGORITHM: &str = "HS256";

fn default_algorithm() -> String {
    DEFAULT_ALGORITHM.to_string()
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

/// Settings consumed by the token issuer and verifier
///
/// # Example
///
/// ```
/// use keypebble::config::IssuerConfig;
///
/// let config = IssuerConfig {
///     hs256_secret: Some("change-me".to_string()),
///     issuer: Some("https://keypebble.local".to_string()),
///     audience: Some("registry".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(config.default_ttl_seconds, 3600);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// `HS256` or `RS256`, case-insensitive
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// `iss` claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// `aud` claim of generic tokens, also the audience expected when decoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Lifetime of issued tokens
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,

    /// Claims added to every generic token, overridden by custom claims
    #[serde(default, skip_serializing_if = "ClaimMap::is_empty")]
    pub static_claims: ClaimMap,

    /// When present, even empty, only these custom claim names survive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_custom_claims: Option<Vec<String>>,

    /// Inline HMAC secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hs256_secret: Option<String>,

    /// File holding the HMAC secret, trimmed on read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hs256_secret_path: Option<PathBuf>,

    /// RSA private key, inline PEM or path to a PEM file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rs256_private_key: Option<String>,

    /// RSA public key, inline PEM or path to a PEM file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rs256_public_key: Option<String>,

    /// PEM bundle whose certificates go into the `x5c` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5c_chain_path: Option<PathBuf>,

    /// `kid` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            issuer: None,
            audience: None,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            static_claims: ClaimMap::new(),
            allowed_custom_claims: None,
            hs256_secret: None,
            hs256_secret_path: None,
            rs256_private_key: None,
            rs256_public_key: None,
            x5c_chain_path: None,
            key_id: None,
        }
    }
}

impl IssuerConfig {
    /// Configured issuer or [`DEFAULT_ISSUER`]
    pub fn issuer_name(&self) -> &str {
        self.issuer.as_deref().unwrap_or(DEFAULT_ISSUER)
    }

    /// Configured audience or [`DEFAULT_AUDIENCE`]
    pub fn audience_name(&self) -> &str {
        self.audience.as_deref().unwrap_or(DEFAULT_AUDIENCE)
    }

    /// Convenience constructor for an HS256 issuer with an inline secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            hs256_secret: Some(secret.into()),
            ..Default::default()
        }
    }
}

// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error taxonomy shared by the policy evaluator and the token issuer/verifier.
//!
//! Malformed scopes are deliberately absent from this enum: they are dropped
//! during parsing and enforcement instead of being raised.

use thiserror::Error;

/// Errors surfaced by issuance, verification and policy generation
#[derive(Error, Debug)]
pub enum TokenError {
    /// Missing or invalid signing material, unsupported algorithm,
    /// unreadable key or policy files.
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Policy generation was asked for a user the policy does not know.
    #[error("User '{user}' not found in policy")]
    UnknownUser { user: String },

    /// Signature, algorithm, expiry or audience check failed while decoding.
    #[error("Token verification failed: {source}")]
    Verification {
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    /// The signing primitive rejected the key or the claims.
    #[error("JWT signing failed: {source}")]
    Signing {
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

impl TokenError {
    /// Shorthand for a [`TokenError::Configuration`]
    pub fn configuration(reason: impl Into<String>) -> Self {
        TokenError::Configuration {
            reason: reason.into(),
        }
    }

    /// Process exit code used by the command line tools
    pub fn exit_code(&self) -> i32 {
        match self {
            TokenError::Configuration { .. } => 1,
            TokenError::UnknownUser { .. } => 2,
            TokenError::Verification { .. } => 3,
            TokenError::Signing { .. } => 4,
        }
    }
}

/// Result alias for the token core
pub type Result<T> = std::result::Result<T, TokenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        let error = TokenError::UnknownUser {
            user: "ghost".to_string(),
        };
        assert_eq!(error.exit_code(), 2);
        assert!(error.to_string().contains("ghost"));

        let error = TokenError::configuration("missing hs256_secret");
        assert_eq!(error.exit_code(), 1);
    }
}

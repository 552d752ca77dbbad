// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JWT Key Management
//!
//! This module resolves signing and verification keys from the issuer
//! configuration. Nothing is cached: secret files, PEM files and the `x5c`
//! bundle are read again on every call so that rotated material is picked up
//! without a restart.
//!
//! RSA keys may be given inline (the value starts with `-----BEGIN`) or as a
//! path to a PEM file.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use log::debug;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::config::IssuerConfig;
use crate::error::{Result, TokenError};

const PEM_PREFIX: &str = "-----BEGIN";
const CERT_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const CERT_END: &str = "-----END CERTIFICATE-----";

/// Signing algorithms supported by the issuer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256 and a shared secret
    HS256,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    RS256,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::HS256 => "HS256",
            SigningAlgorithm::RS256 => "RS256",
        }
    }

    /// Matching `jsonwebtoken` algorithm
    pub fn jwt_algorithm(&self) -> Algorithm {
        match self {
            SigningAlgorithm::HS256 => Algorithm::HS256,
            SigningAlgorithm::RS256 => Algorithm::RS256,
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::HS256),
            "RS256" => Ok(SigningAlgorithm::RS256),
            _ => Err(TokenError::configuration(format!(
                "Unsupported algorithm: {}. Supported algorithms: HS256, RS256",
                s
            ))),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the HMAC secret, inline value first, then the trimmed file content
pub fn load_hs256_secret(config: &IssuerConfig) -> Result<Vec<u8>> {
    if let Some(secret) = &config.hs256_secret {
        return Ok(secret.as_bytes().to_vec());
    }
    if let Some(path) = &config.hs256_secret_path {
        let secret = read_file(path, "hs256_secret_path")?;
        return Ok(secret.trim().as_bytes().to_vec());
    }
    Err(TokenError::configuration(
        "Missing hs256_secret or hs256_secret_path in configuration",
    ))
}

/// Key used to sign tokens with `algorithm`
pub fn encoding_key(config: &IssuerConfig, algorithm: SigningAlgorithm) -> Result<EncodingKey> {
    match algorithm {
        SigningAlgorithm::HS256 => Ok(EncodingKey::from_secret(&load_hs256_secret(config)?)),
        SigningAlgorithm::RS256 => {
            let pem = private_key_pem(config)?;
            EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|err| {
                TokenError::configuration(format!("Invalid RS256 private key: {}", err))
            })
        }
    }
}

/// Key used to verify tokens signed with `algorithm`
///
/// For RS256 the public key is preferred; without one it is derived from the
/// private key.
pub fn decoding_key(config: &IssuerConfig, algorithm: SigningAlgorithm) -> Result<DecodingKey> {
    match algorithm {
        SigningAlgorithm::HS256 => Ok(DecodingKey::from_secret(&load_hs256_secret(config)?)),
        SigningAlgorithm::RS256 => {
            let pem = match &config.rs256_public_key {
                Some(value) => pem_or_file(value, "rs256_public_key")?,
                None => {
                    debug!("No rs256_public_key configured, deriving it from the private key");
                    public_pem_from_private(&private_key_pem(config)?)?
                }
            };
            DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|err| {
                TokenError::configuration(format!("Invalid RS256 public key: {}", err))
            })
        }
    }
}

/// Certificates for the `x5c` header, in file order
///
/// Each entry is the base64 body of one `CERTIFICATE` block with line breaks
/// removed. Text outside the markers is ignored.
pub fn load_x5c_chain<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let contents = read_file(path.as_ref(), "x5c_chain_path")?;
    Ok(parse_certificate_chain(&contents))
}

/// Extract the base64 bodies of the `CERTIFICATE` blocks of a PEM bundle
pub fn parse_certificate_chain(pem: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut rest = pem;
    while let Some(start) = rest.find(CERT_BEGIN) {
        let after_begin = &rest[start + CERT_BEGIN.len()..];
        let Some(end) = after_begin.find(CERT_END) else {
            break;
        };
        let body: String = after_begin[..end]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if !body.is_empty() {
            chain.push(body);
        }
        rest = &after_begin[end + CERT_END.len()..];
    }
    chain
}

fn private_key_pem(config: &IssuerConfig) -> Result<String> {
    match &config.rs256_private_key {
        Some(value) => pem_or_file(value, "rs256_private_key"),
        None => Err(TokenError::configuration(
            "Missing rs256_private_key in configuration",
        )),
    }
}

fn pem_or_file(value: &str, field: &str) -> Result<String> {
    if value.trim_start().starts_with(PEM_PREFIX) {
        return Ok(value.to_string());
    }
    read_file(Path::new(value), field)
}

fn read_file(path: &Path, field: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|err| {
        TokenError::configuration(format!(
            "Cannot read {} at {}: {}",
            field,
            path.display(),
            err
        ))
    })
}

fn public_pem_from_private(private_pem: &str) -> Result<String> {
    let private_key = RsaPrivateKey::from_pkcs1_pem(private_pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(private_pem))
        .map_err(|err| TokenError::configuration(format!("Invalid RS256 private key: {}", err)))?;

    RsaPublicKey::from(&private_key)
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|err| {
            TokenError::configuration(format!("Cannot derive RS256 public key: {}", err))
        })
}

// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! Schema access and the validation rules that JSON schema cannot express.

use std::str::FromStr;

use anyhow::{Context, Result};
use log::debug;

use super::{Config, MAX_TTL_SECONDS};
use crate::jwt::SigningAlgorithm;

/// JSON schema of the configuration file, embedded at compile time
pub const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Output the embedded JSON schema to the console.
///
/// Called by the `schema` sub-command.
///
/// # Example
///
/// ```bash
/// keypebble schema > config.schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Accepts any IPv4 or IPv6 literal plus `localhost`.
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost")
}

/// Validates the configuration against rules the JSON schema does not cover.
///
/// # Validation Rules
///
/// - **Algorithm**: `HS256` or `RS256`, in any letter case
/// - **Lifetime**: `default_ttl_seconds` is between 1 and [`MAX_TTL_SECONDS`]
/// - **HMAC secret**: `hs256_secret` and `hs256_secret_path` are mutually exclusive
/// - **Port Range**: the service port is within 1-65535
/// - **IP Address Format**: the service host is an IP address or `localhost`
///
/// Key material is not read here; missing or unreadable keys surface on the
/// first issue or decode call so that rotated files are always picked up.
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    let issuer = &config.issuer;

    SigningAlgorithm::from_str(&issuer.algorithm)
        .map_err(|err| anyhow::anyhow!("Invalid algorithm: {}", err))?;

    if issuer.default_ttl_seconds == 0 {
        anyhow::bail!("default_ttl_seconds must be greater than zero");
    }

    if issuer.default_ttl_seconds > MAX_TTL_SECONDS {
        anyhow::bail!(
            "default_ttl_seconds must not exceed {} (got {})",
            MAX_TTL_SECONDS,
            issuer.default_ttl_seconds
        );
    }

    if issuer.hs256_secret.is_some() && issuer.hs256_secret_path.is_some() {
        anyhow::bail!("hs256_secret and hs256_secret_path are mutually exclusive");
    }

    if config.service.port == 0 {
        anyhow::bail!("Invalid port number: {}", config.service.port);
    }

    if !is_valid_ip_address(&config.service.host) {
        anyhow::bail!("Invalid host address: {}", config.service.host);
    }

    Ok(())
}

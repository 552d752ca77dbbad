// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for keypebble
//!
//! The configuration is a YAML file validated against an embedded JSON schema
//! before it is deserialized. Issuer settings sit at the top level; the
//! `service` and `policy` sections configure the HTTP service.
//!
//! ```yaml
//! algorithm: HS256
//! issuer: https://keypebble.local
//! audience: registry
//! default_ttl_seconds: 900
//! hs256_secret_path: /run/secrets/keypebble
//! static_claims:
//!   env: prod
//! allowed_custom_claims: [sub, scope, access]
//! service:
//!   host: 0.0.0.0
//!   port: 8080
//! policy:
//!   path: /etc/keypebble/policy.yaml
//!   reload: true
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use keypebble::config::Config;
//!
//! let config = Config::from_file("config.yaml").unwrap();
//! println!("Issuing tokens for {}", config.issuer.issuer_name());
//! ```

pub mod issuer;
pub mod service;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use issuer::{
    IssuerConfig, DEFAULT_ALGORITHM, DEFAULT_AUDIENCE, DEFAULT_ISSUER, DEFAULT_TTL_SECONDS,
    MAX_TTL_SECONDS,
};
pub use service::{PolicyConfig, ServiceConfig, DEFAULT_POLICY_PATH};
pub use utils::{is_valid_ip_address, output_config_schema, CONFIG_SCHEMA};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Issuer settings, flattened into the top level of the file
    #[serde(flatten)]
    pub issuer: IssuerConfig,

    /// HTTP binding for `serve`
    #[serde(default)]
    pub service: ServiceConfig,

    /// Policy file location and reload strategy
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl Config {
    /// Load and validate configuration from a YAML file
    ///
    /// Unlike many services a missing file is an error: there is no sensible
    /// default signing secret.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        Self::from_yaml_str(&contents)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value =
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?;
        let yaml_value = match yaml_value {
            serde_yml::Value::Null => serde_yml::Value::Mapping(Default::default()),
            other => other,
        };

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating configuration against schema");
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = serde_json::from_value(json_value)
            .context("Failed to deserialize configuration")?;

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }
}

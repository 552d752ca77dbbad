// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTTP service and policy source settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Policy path used by `serve` when neither the command line nor the
/// configuration names one
pub const DEFAULT_POLICY_PATH: &str = "/etc/keypebble/policy.yaml";

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_reload() -> bool {
    true
}

/// Network binding of the token service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Policy document location and loading strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Policy YAML file; without it every scope request passes unfiltered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Re-read the file on every request instead of once at start-up
    ///
    /// Reloading trades one disk read per request for never serving a stale
    /// policy.
    #[serde(default = "default_reload")]
    pub reload: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: None,
            reload: default_reload(),
        }
    }
}

// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Keypebble
//!
//! A short-lived JWT issuer. Callers present claims, optionally filtered by a
//! YAML access policy, and receive a signed HS256 or RS256 token. Three
//! request shapes are served: generic claim sets, Docker registry scope
//! requests and Kubernetes `TokenRequest`s.
//!
//! - [`scope`]: `type:name:actions` codec
//! - [`policy`]: enforcement and generation against the policy document
//! - [`claims`]: claim assembly from requests
//! - [`jwt`]: issuance and verification
//! - [`service`]: the Rocket HTTP front end

pub mod claims;
pub mod config;
pub mod error;
pub mod jwt;
pub mod policy;
pub mod scope;
pub mod service;

pub use error::{Result, TokenError};

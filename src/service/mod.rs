// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTTP token service
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/healthz` | readiness |
//! | POST | `/auth` | generic token from a JSON object of claims |
//! | GET | `/v2/token` | Docker registry token, identity from `X-Authenticated-User` |
//! | POST | `/apis/authentication.k8s.io/v1/namespaces/<ns>/serviceaccounts/<name>/token` | Kubernetes `TokenRequest` |
//!
//! Errors are answered as `{"error": "..."}`.

pub mod context;
pub mod error;
pub mod routes;
pub mod server;

pub use context::{HttpRequestContext, AUTHENTICATED_USER_HEADER, SCOPE_HEADER};
pub use error::ApiError;
pub use server::{build_rocket, ServicePolicy};

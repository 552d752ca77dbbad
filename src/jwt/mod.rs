// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JWT issuance and verification (HS256 and RS256)

pub mod issuer;
pub mod keys;
pub mod validator;

pub use issuer::{issue_token, TokenIssuer};
pub use keys::{parse_certificate_chain, SigningAlgorithm};
pub use validator::{decode_token, TokenValidator};

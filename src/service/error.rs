// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use log::{error, warn};
use rocket::http::{Header, Status};
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::Request;
use serde_json::json;

use crate::error::TokenError;

/// JSON error answer `{"error": message}`
#[derive(Debug)]
pub struct ApiError {
    pub status: Status,
    pub message: String,
    /// `WWW-Authenticate` challenge sent with 401 answers
    pub challenge: Option<&'static str>,
}

impl ApiError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
            challenge: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(Status::BadRequest, message)
    }

    /// 401 asking the client to authenticate with the fronting proxy
    pub fn unauthenticated() -> Self {
        ApiError {
            status: Status::Unauthorized,
            message: "unauthenticated".to_string(),
            challenge: Some("Basic realm=\"Keypebble\""),
        }
    }
}

/// HTTP status answered when a core error reaches a handler
fn token_error_status(err: &TokenError) -> Status {
    match err {
        TokenError::Configuration { .. } | TokenError::Signing { .. } => {
            Status::InternalServerError
        }
        TokenError::UnknownUser { .. } => Status::Forbidden,
        TokenError::Verification { .. } => Status::Unauthorized,
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        let status = token_error_status(&err);
        if status.code >= 500 {
            error!("Token request failed: {}", err);
        } else {
            warn!("Token request refused: {}", err);
        }
        ApiError::new(status, err.to_string())
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let body = Json(json!({ "error": self.message })).respond_to(request)?;
        let mut response = Response::build_from(body).status(self.status).finalize();
        if let Some(challenge) = self.challenge {
            response.set_header(Header::new("WWW-Authenticate", challenge));
        }
        Ok(response)
    }
}

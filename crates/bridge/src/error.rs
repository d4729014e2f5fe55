// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed error taxonomy for the bridge core. Library code returns
//! `Result<T, BridgeError>`; only `main.rs` and background task bodies use
//! `anyhow` at the edges.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// The six kinds from the error-handling design, plus the two HTTP-only
/// shapes the local admin surface needs.
#[derive(Debug)]
pub enum BridgeError {
    Validation(String),
    TransientIo(String),
    Adapter(String),
    Auth(String),
    Capacity(String),
    Integrity(String),
    NotFound(String),
    BadRequest(String),
}

impl BridgeError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => 400,
            Self::Auth(_) => 401,
            Self::NotFound(_) => 404,
            Self::Capacity(_) => 429,
            Self::TransientIo(_) | Self::Adapter(_) => 502,
            Self::Integrity(_) => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::TransientIo(_) => "transient_io",
            Self::Adapter(_) => "adapter",
            Self::Auth(_) => "auth",
            Self::Capacity(_) => "capacity",
            Self::Integrity(_) => "integrity",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
        }
    }

    /// Whether a submission-service caller should treat this as retryable.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientIo(_))
    }

    fn message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::TransientIo(m)
            | Self::Adapter(m)
            | Self::Auth(m)
            | Self::Capacity(m)
            | Self::Integrity(m)
            | Self::NotFound(m)
            | Self::BadRequest(m) => m,
        }
    }

    fn to_error_body(&self) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: self.message().to_owned() }
    }

    pub fn to_http_response(&self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body() };
        (status, axum::Json(body)).into_response()
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.as_str(), self.message())
    }
}

impl std::error::Error for BridgeError {}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        self.to_http_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

impl From<rusqlite::Error> for BridgeError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Integrity(e.to_string())
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Self::TransientIo(e.to_string())
        } else if let Some(status) = e.status() {
            if status.is_server_error() {
                Self::TransientIo(e.to_string())
            } else {
                Self::Auth(e.to_string())
            }
        } else {
            Self::TransientIo(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(BridgeError::Validation("x".into()).http_status(), 400);
        assert_eq!(BridgeError::Auth("x".into()).http_status(), 401);
        assert_eq!(BridgeError::NotFound("x".into()).http_status(), 404);
        assert_eq!(BridgeError::Capacity("x".into()).http_status(), 429);
        assert_eq!(BridgeError::Integrity("x".into()).http_status(), 500);
    }

    #[test]
    fn transient_io_is_retryable_only() {
        assert!(BridgeError::TransientIo("timeout".into()).is_transient());
        assert!(!BridgeError::Adapter("fault".into()).is_transient());
    }
}

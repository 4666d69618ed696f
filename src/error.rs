// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error taxonomy shared by the vault, the account engine and the notifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// Unknown address, wallet or unopened account.
    #[error("{0}")]
    NotFound(String),

    /// Stale-height send race or concurrent record update.
    #[error("{0}")]
    Conflict(String),

    /// Insufficient balance, malformed or wrong key, bad request data.
    #[error("{0}")]
    InvalidInput(String),

    /// The wallet holding the key material is locked.
    #[error("{0}")]
    Locked(String),

    /// Ledger, worker or store temporarily unreachable.
    #[error("{0}")]
    Transient(String),

    /// Unrecoverable condition, aborts startup.
    #[error("{0}")]
    Fatal(String),

    /// Shutdown interrupted a pending operation.
    #[error("operation cancelled by shutdown")]
    Cancelled,
}

pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<WalletError> for ApiError {
    fn from(error: WalletError) -> Self {
        let status = match &error {
            WalletError::NotFound(_) => StatusCode::NOT_FOUND,
            WalletError::Conflict(_) => StatusCode::CONFLICT,
            WalletError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            WalletError::Locked(_) => StatusCode::LOCKED,
            WalletError::Transient(_) | WalletError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            WalletError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");
    }

    #[test]
    fn wallet_errors_map_to_statuses() {
        let cases = [
            (WalletError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (WalletError::Conflict("x".into()), StatusCode::CONFLICT),
            (WalletError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (WalletError::Locked("x".into()), StatusCode::LOCKED),
            (WalletError::Transient("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (WalletError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (WalletError::Fatal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status, status);
        }
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::from(WalletError::Conflict("stale height".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"stale height"}"#);
    }
}

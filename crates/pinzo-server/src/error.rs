//! Server error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use pinzo_proto::error_codes;

/// Server errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request has no valid session.
    #[error("authentication required")]
    Unauthorized,

    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// Record store error.
    #[error("store error: {0}")]
    Store(#[from] pinzo_core::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            AppError::Store(pinzo_core::Error::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            AppError::Store(e) if e.is_invalid_input() => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST")
            }
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Numeric rejection code sent to WebSocket clients for a failed mutation.
pub fn rejection_code(error: &pinzo_core::Error) -> u32 {
    match error {
        pinzo_core::Error::NotFound(_) => error_codes::NOT_FOUND,
        e if e.is_invalid_input() => error_codes::INVALID_REQUEST,
        _ => error_codes::INTERNAL,
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pinzo_proto::RecordId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AppError::Store(pinzo_core::Error::NotFound(RecordId::new())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Store(pinzo_core::Error::Storage("disk".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_rejection_codes() {
        assert_eq!(
            rejection_code(&pinzo_core::Error::NotFound(RecordId::new())),
            error_codes::NOT_FOUND
        );
        assert_eq!(
            rejection_code(&pinzo_core::Error::Storage("x".into())),
            error_codes::INTERNAL
        );
    }
}

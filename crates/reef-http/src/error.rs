//! HTTP error types and JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reef_engine::EngineError;
use serde::Serialize;
use tracing::error;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The requested key does not exist.
    #[error("Key '{key}' not found")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// Malformed request body.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// An error from the shard manager.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// JSON body of every error response.
#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl HttpError {
    /// Map to an HTTP status code.
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidRequest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable error code.
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Engine(_) => "internal_error",
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Engine failures are logged in full but never leak to clients.
        let message = match &self {
            Self::Engine(e) => {
                error!(error = %e, "request failed");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

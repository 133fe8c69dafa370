//! API error type and its JSON response.
//!
//! Every failure is answered with `{"success": false, "error": "..."}`. Client
//! mistakes map to 4xx, backend trouble to 5xx.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use climate_core::{BackendError, ValidationError};
use climate_live::ConnectError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or non-numeric reading fields (400)
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Body that could not be decoded at all (400)
    #[error("malformed request body: {0}")]
    BadRequest(String),

    /// Storage backend failure (503 when unavailable, 500 otherwise)
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Internal server error (500)
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Backend(err) if err.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Backend(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ConnectError> for ApiError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Backend(err) => Self::Backend(err),
            ConnectError::Delivery(err) => Self::Internal(err.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "API error");
        } else {
            tracing::warn!(error = %self, "rejected request");
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

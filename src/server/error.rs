//! Handler errors and their HTTP mapping.
//!
//! Every error body still carries `displayPopup: false`, so a client that
//! only reads the decision fields keeps the prompt hidden.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::PopgateError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Invalid request data (400).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Reader state store failed (503).
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Anything else (500).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PopgateError> for AppError {
    fn from(err: PopgateError) -> Self {
        if err.is_store_failure() {
            Self::Unavailable(err.to_string())
        } else if matches!(err, PopgateError::ValidationFailed(_)) {
            Self::BadRequest(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::BadRequest(msg) | Self::Unavailable(msg) | Self::Internal(msg) => msg.clone(),
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        }

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
            "currentViews": 0,
            "displayPopup": false,
        }));
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

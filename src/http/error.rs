//! HTTP error handling and response types.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;
use crate::services::ingestion::GateError;
use crate::services::validation::ValidationError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Seconds until a rejected request may be retried (abuse control only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retry_after_seconds: None,
        }
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }
}

/// Application error type for HTTP handlers.
///
/// Three client-visible classes stay distinct end to end: validation errors
/// ("fix your input"), abuse-control rejections ("wait and retry"), and
/// availability errors ("try again later").
#[derive(Debug)]
pub enum AppError {
    /// Ingestion gate rejection or failure
    Gate(GateError),
    /// Resource not found
    NotFound(String),
    /// Missing or wrong credentials for a privileged operation
    Forbidden(String),
    /// Internal server error
    Internal(String),
    /// Repository error outside the gate (feed/snapshot/prune reads)
    Repository(RepositoryError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Gate(GateError::Validation(ValidationError::PayloadTooLarge)) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            AppError::Gate(GateError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Gate(GateError::TooSoon { .. })
            | AppError::Gate(GateError::VolumeLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Gate(GateError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Gate(GateError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Repository(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error, retry_after) = match &self {
            AppError::Gate(gate_error) => {
                let retry_after = gate_error.retry_after_seconds();
                let mut body = ApiError::new(gate_error.code(), gate_error.to_string());
                if let Some(seconds) = retry_after {
                    body = body.with_retry_after(seconds);
                }
                (body, retry_after)
            }
            AppError::NotFound(msg) => (ApiError::new("not_found", msg.clone()), None),
            AppError::Forbidden(msg) => (ApiError::new("forbidden", msg.clone()), None),
            AppError::Internal(msg) => (ApiError::new("internal_error", msg.clone()), None),
            AppError::Repository(e) if e.is_retryable() => {
                (ApiError::new("store_unavailable", e.to_string()), None)
            }
            AppError::Repository(e) => (ApiError::new("store_error", e.to_string()), None),
        };

        let mut response = (status, Json(error)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = header::HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        AppError::Gate(err)
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::services::queue::QueueError;

/// Errors returned by the HTTP handlers as `{"error": "..."}` bodies.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Job {0} not found")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            QueueError::NotFound(id) => ApiError::NotFound(id.to_string()),
            QueueError::QueueFull { .. } | QueueError::Closed => ApiError::Unavailable(e.to_string()),
            QueueError::InvalidTransition { .. } => {
                tracing::error!(error = %e, "Unexpected job transition from request path");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use courier_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Also covers access denials, so existence never leaks.
    #[error("Not found")]
    NotFound,

    #[error("No conversations")]
    NoConversations,

    /// Informational; the resource already existed.
    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(msg) => ApiError::BadRequest(msg),
            e @ (CoreError::AccessDenied { .. } | CoreError::NotFound(_)) => {
                tracing::debug!(error = %e, "reporting as not found");
                ApiError::NotFound
            }
            CoreError::Conflict(msg) => ApiError::Conflict(msg),
            e @ (CoreError::Storage(_) | CoreError::Stream(_)) => {
                tracing::error!(error = %e, "request failed");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": self.to_string() }),
            ),
            ApiError::Unauthenticated(_) => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": self.to_string() }),
            ),
            ApiError::NotFound | ApiError::NoConversations => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": self.to_string() }),
            ),
            ApiError::Conflict(msg) => (StatusCode::CREATED, serde_json::json!({ "msg": msg })),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "Internal server error" }),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced at the HTTP boundary. Everything renders as the standard
/// `{status:false, error}` envelope with a conventional status code.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request parameter.
    #[error("{0}")]
    BadRequest(String),

    /// Unknown result identifier or missing stored path.
    #[error("{0}")]
    NotFound(String),

    /// Provider, download, or storage failure. The message is human-readable
    /// and safe to surface.
    #[error("{0}")]
    Upstream(String),

    /// Anything unexpected. Logged with detail server-side, surfaced as a
    /// generic message.
    #[error("Internal server error")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Surface only the top-level context of the error chain; lower frames
    /// stay in the server log.
    pub fn upstream(err: anyhow::Error) -> Self {
        Self::Upstream(format!("{err}"))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Upstream(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({"status": false, "error": message}))).into_response()
    }
}

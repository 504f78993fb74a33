/// Error types for the Ripedly API.
///
/// `ToolError` describes what went wrong with an external process;
/// `ApiError` is what a handler returns and always renders as a JSON
/// `{"error": ...}` body with a non-2xx status.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use ripedly_shared::models::ErrorBody;

/// Failures of an external tool invocation (yt-dlp, ffmpeg).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to spawn {tool}: {reason}")]
    SpawnFailed { tool: String, reason: String },

    #[error("{tool} exited with code {code:?}: {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("{tool} returned unusable output: {reason}")]
    InvalidOutput { tool: String, reason: String },

    #[error("No playable video/audio streams found")]
    NoStreams,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handler-level error, rendered as JSON.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Server is busy, try again shortly")]
    Busy,

    #[error("{0}")]
    Processing(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Map a tool failure to a client-facing error. Timeouts keep their
    /// own status; everything else becomes `fallback`.
    pub fn from_tool(err: &ToolError, fallback: &str) -> Self {
        match err {
            ToolError::Timeout { secs, .. } => {
                Self::Timeout(format!("Video processing timed out after {}s", secs))
            }
            _ => Self::processing(fallback),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Processing(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

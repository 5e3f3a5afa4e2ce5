//! HTTP transport error types and response mapping
//!
//! `Error` covers transport-level failures (bind, outbound requests, SSE
//! framing). `ApiError` is the response side: a pure translation from the
//! core error taxonomy to `(status code, structured body)`, deterministic
//! for the same failing input.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pipehost_core::{ErrorKind, ErrorPayload};
use thiserror::Error;

/// HTTP transport error types
#[derive(Debug, Error)]
pub enum Error {
    /// Server failed to bind or serve
    #[error("server error: {0}")]
    Server(String),

    /// Connection setup error
    #[error("connection error: {0}")]
    Connection(String),

    /// Outbound HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// SSE stream error
    #[error("SSE stream error: {0}")]
    Stream(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Structured error returned by a pipehost server
    #[error("remote {} error: {}", .0.kind, .0.message)]
    Remote(ErrorPayload),
}

/// Result type for HTTP transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Renders a core error as the wire-level error response
///
/// Internal errors are logged with full context server-side; the response
/// body carries the generic message produced by `ErrorPayload`.
#[derive(Debug)]
pub struct ApiError(pub pipehost_core::Error);

impl From<pipehost_core::Error> for ApiError {
    fn from(error: pipehost_core::Error) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = ErrorPayload::from(&self.0);
        match payload.kind {
            ErrorKind::Internal => tracing::error!(error = %self.0, "internal error"),
            ErrorKind::Invocation => tracing::warn!(error = %self.0, "invocation failed"),
            _ => tracing::debug!(error = %self.0, "request rejected"),
        }

        let status = StatusCode::from_u16(payload.kind.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(payload)).into_response()
    }
}

//! Stream events and wire-level error payloads
//!
//! A streaming invocation produces an ordered sequence of `StreamEvent`s.
//! The sequence always ends with exactly one terminal event (`end` or
//! `error`) and nothing follows it. `ErrorPayload` is the structured error
//! body shared by HTTP error responses and terminal `error` frames, so a
//! failure looks the same to clients whichever path surfaced it.

use crate::error::Error;
use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Client-facing error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request payload rejected before invocation (client-caused)
    Validation,
    /// No pipeline registered for the requested path
    NotFound,
    /// Pipeline-caused failure, potentially transient
    Invocation,
    /// System-caused failure, non-retryable
    Internal,
}

impl ErrorKind {
    /// HTTP status code for this category
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 422,
            ErrorKind::NotFound => 404,
            ErrorKind::Invocation | ErrorKind::Internal => 500,
        }
    }

    /// Wire-level name of this category
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Invocation => "invocation",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured error body returned to clients
///
/// Bodies are deterministic for the same failing input so client-side retry
/// logic can rely on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error category
    pub kind: ErrorKind,
    /// Human-readable message (generic for internal errors)
    pub message: String,
    /// HTTP status code the category maps to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Structured validation errors (only for validation failures)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Vec<ValidationError>>,
}

impl ErrorPayload {
    /// Create a payload with the status code implied by its kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: Some(kind.status_code()),
            validation_errors: None,
        }
    }
}

impl From<&Error> for ErrorPayload {
    fn from(error: &Error) -> Self {
        let kind = error.kind();
        // Internal detail stays server-side; clients get a stable generic message.
        let message = match kind {
            ErrorKind::Internal => "internal server error".to_string(),
            _ => error.to_string(),
        };
        let validation_errors = match error {
            Error::Validation(errors) if !errors.is_empty() => Some(errors.clone()),
            _ => None,
        };
        Self {
            kind,
            message,
            status_code: Some(kind.status_code()),
            validation_errors,
        }
    }
}

/// One unit of a streaming response sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Partial output produced by the pipeline
    Data {
        /// Partial output payload
        data: Value,
    },
    /// Clean end of the sequence
    End,
    /// Failure; carries the same shape as an HTTP error body
    Error {
        /// Error payload
        error: ErrorPayload,
    },
}

impl StreamEvent {
    /// Build a data event
    pub fn data(value: Value) -> Self {
        StreamEvent::Data { data: value }
    }

    /// Build a terminal error event from a dispatch error
    pub fn error(error: &Error) -> Self {
        StreamEvent::Error {
            error: ErrorPayload::from(error),
        }
    }

    /// Whether this event terminates the sequence
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::End | StreamEvent::Error { .. })
    }

    /// Wire-level tag of this variant
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Data { .. } => "data",
            StreamEvent::End => "end",
            StreamEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(ErrorKind::NotFound).unwrap(),
            json!("not_found")
        );
        assert_eq!(
            serde_json::to_value(ErrorKind::Validation).unwrap(),
            json!("validation")
        );
        assert_eq!(format!("{}", ErrorKind::Invocation), "invocation");
    }

    #[test]
    fn test_data_event_serialization() {
        let event = StreamEvent::data(json!({"token": "hi"}));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "data", "data": {"token": "hi"}})
        );
    }

    #[test]
    fn test_end_event_serialization() {
        assert_eq!(
            serde_json::to_value(StreamEvent::End).unwrap(),
            json!({"event": "end"})
        );
    }

    #[test]
    fn test_terminal_events() {
        assert!(!StreamEvent::data(json!(1)).is_terminal());
        assert!(StreamEvent::End.is_terminal());
        assert!(StreamEvent::error(&Error::Pipeline("x".into())).is_terminal());
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let payload = ErrorPayload::from(&Error::Internal("connection string leaked".into()));
        assert_eq!(payload.kind, ErrorKind::Internal);
        assert_eq!(payload.message, "internal server error");
        assert!(!payload.message.contains("connection string"));
    }

    #[test]
    fn test_invocation_error_payload() {
        let payload = ErrorPayload::from(&Error::Pipeline("model unavailable".into()));
        assert_eq!(payload.kind, ErrorKind::Invocation);
        assert_eq!(payload.status_code, Some(500));
        assert!(payload.message.contains("model unavailable"));
        assert!(payload.validation_errors.is_none());
    }

    #[test]
    fn test_payload_is_deterministic() {
        let a = ErrorPayload::from(&Error::NotFound("agent".into()));
        let b = ErrorPayload::from(&Error::NotFound("agent".into()));
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}

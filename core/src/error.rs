//! Error types for the dispatch core

use crate::event::ErrorKind;
use crate::validation::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for dispatch core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the dispatch core
#[derive(Debug, Error)]
pub enum Error {
    /// Request payload rejected by the pipeline's declared input schema
    #[error("{} validation error(s) in request payload", .0.len())]
    Validation(Vec<ValidationError>),

    /// No pipeline registered for the requested prefix
    #[error("no pipeline registered at '{0}'")]
    NotFound(String),

    /// Invocation exceeded the configured deadline
    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    /// Failure raised by the pipeline itself
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Pipeline declared a schema that does not compile
    #[error("invalid schema: {0}")]
    Schema(String),

    /// Registry misconfiguration (duplicate or malformed prefix)
    #[error("registry error: {0}")]
    Registry(String),

    /// Internal contract violation
    #[error("internal error: {0}")]
    Internal(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Client-facing error category for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Timeout(_) | Error::Pipeline(_) => ErrorKind::Invocation,
            Error::Schema(_) | Error::Registry(_) | Error::Internal(_) | Error::Json(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// HTTP status code this error maps to
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Coerce an error raised inside a pipeline call into invocation kind.
    ///
    /// Pipeline-internal failures must never cross the dispatch boundary
    /// unchanged; only timeouts keep their identity so callers can tell them
    /// apart from pipeline-raised errors.
    pub(crate) fn into_invocation(self) -> Error {
        match self {
            error @ (Error::Pipeline(_) | Error::Timeout(_)) => error,
            other => Error::Pipeline(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::Validation(vec![]).kind(), ErrorKind::Validation);
        assert_eq!(Error::NotFound("agent".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::Invocation
        );
        assert_eq!(Error::Pipeline("boom".into()).kind(), ErrorKind::Invocation);
        assert_eq!(Error::Schema("bad".into()).kind(), ErrorKind::Internal);
        assert_eq!(Error::Registry("dup".into()).kind(), ErrorKind::Internal);
        assert_eq!(Error::Internal("bug".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Validation(vec![]).status_code(), 422);
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::Pipeline("x".into()).status_code(), 500);
        assert_eq!(Error::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_into_invocation_preserves_timeout() {
        let error = Error::Timeout(Duration::from_secs(5)).into_invocation();
        assert!(matches!(error, Error::Timeout(_)));
    }

    #[test]
    fn test_into_invocation_wraps_other_kinds() {
        let error = Error::Internal("leaked detail".into()).into_invocation();
        assert!(matches!(error, Error::Pipeline(_)));
        assert_eq!(error.kind(), ErrorKind::Invocation);
    }
}

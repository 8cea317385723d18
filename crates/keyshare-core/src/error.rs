//! Unified application error types for KeyShare.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Admission denials are *not* errors;
//! they travel as typed outcomes and only become an [`AppError`] when a
//! caller explicitly converts them.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// A user, account, or session does not exist.
    NotFound,
    /// The user is not associated with the requested account.
    Unauthorized,
    /// The user already occupies as many devices as allowed.
    DeviceLimitExceeded,
    /// The account already hosts as many sessions as allowed.
    ConcurrencyLimitExceeded,
    /// The user's access window has closed.
    UserExpired,
    /// The snapshot could not be read or written.
    StoreUnavailable,
    /// Input validation failed.
    Validation,
    /// A uniqueness constraint would be violated.
    Conflict,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Unauthorized => write!(f, "UNAUTHORIZED"),
            Self::DeviceLimitExceeded => write!(f, "DEVICE_LIMIT_EXCEEDED"),
            Self::ConcurrencyLimitExceeded => write!(f, "CONCURRENCY_LIMIT_EXCEEDED"),
            Self::UserExpired => write!(f, "USER_EXPIRED"),
            Self::StoreUnavailable => write!(f, "STORE_UNAVAILABLE"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout KeyShare.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Create a store-unavailable error.
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StoreUnavailable, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether the caller may retry the same operation later.
    ///
    /// Only store I/O failures are transient; every other kind reflects
    /// the current state of the snapshot and will repeat on retry.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::StoreUnavailable
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::StoreUnavailable, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_retryable() {
        let err: AppError = std::io::Error::other("disk gone").into();
        assert_eq!(err.kind, ErrorKind::StoreUnavailable);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_display_includes_kind() {
        let err = AppError::not_found("Session abc not found");
        assert_eq!(err.to_string(), "NOT_FOUND: Session abc not found");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_clone_drops_source() {
        let err: AppError = std::io::Error::other("boom").into();
        let cloned = err.clone();
        assert!(cloned.source.is_none());
        assert_eq!(cloned.kind, err.kind);
    }
}

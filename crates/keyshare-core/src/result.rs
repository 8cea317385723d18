//! Convenience result type alias for KeyShare.

use crate::error::AppError;

/// A specialized `Result` type for KeyShare operations.
pub type AppResult<T> = Result<T, AppError>;

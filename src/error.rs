//! Error types for the Lancet library.
//!
//! Every fallible operation returns [`Result`], whose error side is the
//! [`LancetError`] enum. Each variant corresponds to exactly one failure kind
//! so callers (for example an HTTP layer) can map them without inspecting
//! messages.
//!
//! # Examples
//!
//! ```
//! use lancet::error::{LancetError, Result};
//!
//! fn lookup() -> Result<()> {
//!     Err(LancetError::not_found("library 'books'"))
//! }
//!
//! match lookup() {
//!     Err(LancetError::NotFound(what)) => assert_eq!(what, "library 'books'"),
//!     _ => unreachable!(),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Lancet operations.
#[derive(Error, Debug)]
pub enum LancetError {
    /// An identity path (library, document or chunk) does not resolve.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A create operation collided with an existing identity.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// An embedding or query length disagrees with the library dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Empty or non-finite embedding.
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Bad argument such as `k == 0` or an unknown algorithm name.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Reserved for optimistic mutation schemes. The blocking lock discipline
    /// used by [`crate::database::Database`] never produces it.
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Building an index structure failed. Only the index is affected.
    #[error("Index error: {0}")]
    Index(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O errors (snapshot and config files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for operations that may fail with LancetError.
pub type Result<T> = std::result::Result<T, LancetError>;

impl LancetError {
    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        LancetError::NotFound(msg.into())
    }

    /// Create a new already exists error.
    pub fn already_exists<S: Into<String>>(msg: S) -> Self {
        LancetError::AlreadyExists(msg.into())
    }

    /// Create a new dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        LancetError::DimensionMismatch { expected, actual }
    }

    /// Create a new invalid vector error.
    pub fn invalid_vector<S: Into<String>>(msg: S) -> Self {
        LancetError::InvalidVector(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        LancetError::InvalidArgument(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        LancetError::Index(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        LancetError::InvalidConfig(msg.into())
    }

    /// Short, stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LancetError::NotFound(_) => "not_found",
            LancetError::AlreadyExists(_) => "already_exists",
            LancetError::DimensionMismatch { .. } => "dimension_mismatch",
            LancetError::InvalidVector(_) => "invalid_vector",
            LancetError::InvalidArgument(_) => "invalid_argument",
            LancetError::ConcurrencyConflict(_) => "concurrency_conflict",
            LancetError::Index(_) => "index",
            LancetError::InvalidConfig(_) => "invalid_config",
            LancetError::Io(_) => "io",
            LancetError::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = LancetError::not_found("library 'a'");
        assert_eq!(error.to_string(), "Not found: library 'a'");

        let error = LancetError::dimension_mismatch(3, 2);
        assert_eq!(error.to_string(), "Dimension mismatch: expected 3, got 2");

        let error = LancetError::invalid_argument("k must be at least 1");
        assert_eq!(error.to_string(), "Invalid argument: k must be at least 1");
        assert_eq!(error.kind(), "invalid_argument");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let lancet_error = LancetError::from(io_error);

        match lancet_error {
            LancetError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }
}

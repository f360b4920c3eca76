//! Core error types.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while validating identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("bucket id is empty")]
    EmptyBucketId,

    #[error("invalid bucket id {id:?}: {reason}")]
    InvalidBucketId { id: String, reason: &'static str },

    #[error("invalid table reference {0:?}: expected `schema.name`")]
    InvalidTableRef(String),
}

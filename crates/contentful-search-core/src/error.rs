//! Error types for the core pipeline.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by resolution and transformation.
///
/// Node-local resolution failures (dangling links, cycles, malformed inline
/// entries) never surface here; they are replaced by an empty object at the
/// offending position.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The entry list cannot be indexed (empty or duplicate ids).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The entry list could not be serialized for memoization.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

//! Error types for Jitterless.

use thiserror::Error;

/// Main error type for Jitterless operations.
///
/// Poor tracking evidence is not an error: it degrades the reported quality
/// instead.
#[derive(Error, Debug)]
pub enum JitterlessError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Frame mismatch: {0}")]
    FrameMismatch(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for Jitterless operations.
pub type Result<T> = std::result::Result<T, JitterlessError>;

//! Sanitizer error types
//!
//! Error codes:
//! - OPG_COLLECTION_NOT_FOUND (REJECT, from the registry)
//! - OPG_SANITIZE_DEPTH (REJECT)

use thiserror::Error;

use crate::schema::SchemaError;

/// Result type for sanitizer operations
pub type SanitizeResult<T> = Result<T, SanitizeError>;

/// Sanitizer errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SanitizeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Input nests deeper than the configured bound
    #[error("Input nesting exceeds maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },
}

impl SanitizeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schema(e) => e.code(),
            Self::DepthExceeded { .. } => "OPG_SANITIZE_DEPTH",
        }
    }
}

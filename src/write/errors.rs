//! Write executor error types
//!
//! Error codes:
//! - OPG_WRITE_VALIDATION: plan is incomplete or empty after sanitizing
//! - OPG_WRITE_DISABLED: writes are switched off
//! - OPG_WRITE_CONFIG: target collection is not registered
//! - OPG_SANITIZE_DEPTH: plan nested beyond the sanitizer bound
//! - OPG_STORE_*: the transaction failed and was aborted
//!
//! Guard and dry-run results are outcomes, not errors.

use thiserror::Error;

use crate::sanitizer::SanitizeError;
use crate::schema::SchemaError;
use crate::store::StoreError;

/// Result type for writes
pub type WriteResult<T> = Result<T, WriteError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    /// Rejected before any transaction opened
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Writes are disabled; set allow_writes or OPGUARD_ALLOW_WRITES=true")]
    WritesDisabled,

    #[error("Configuration error: {0}")]
    Config(#[source] SchemaError),

    #[error(transparent)]
    Sanitize(SanitizeError),

    /// Storage failure; the transaction was aborted and nothing persisted
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WriteError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "OPG_WRITE_VALIDATION",
            Self::WritesDisabled => "OPG_WRITE_DISABLED",
            Self::Config(_) => "OPG_WRITE_CONFIG",
            Self::Sanitize(e) => e.code(),
            Self::Store(e) => e.code(),
        }
    }

    /// True when the request was refused before reaching storage
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

impl From<SanitizeError> for WriteError {
    fn from(err: SanitizeError) -> Self {
        match err {
            SanitizeError::Schema(e) => Self::Config(e),
            other => Self::Sanitize(other),
        }
    }
}

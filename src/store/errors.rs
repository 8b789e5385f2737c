//! Document store error types
//!
//! Error codes:
//! - OPG_STORE_DUPLICATE_KEY
//! - OPG_STORE_INVALID_QUERY
//! - OPG_STORE_INVALID_UPDATE
//! - OPG_STORE_INJECTED
//! - OPG_STORE_POISONED
//! - OPG_STORE_IO

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Document store errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A unique field already holds the value
    #[error("Duplicate key in {collection}: {field} = {value}")]
    DuplicateKey {
        collection: String,
        field: String,
        value: String,
    },

    /// Filter uses an unsupported or malformed operator
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Update uses an unsupported or malformed operator
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    /// An armed fail point fired
    #[error("Injected failure at {0}")]
    Injected(String),

    /// A writer panicked while holding the store lock
    #[error("Store lock poisoned")]
    Poisoned,

    /// Snapshot could not be read or written
    #[error("Store I/O error: {0}")]
    Io(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateKey { .. } => "OPG_STORE_DUPLICATE_KEY",
            Self::InvalidQuery(_) => "OPG_STORE_INVALID_QUERY",
            Self::InvalidUpdate(_) => "OPG_STORE_INVALID_UPDATE",
            Self::Injected(_) => "OPG_STORE_INJECTED",
            Self::Poisoned => "OPG_STORE_POISONED",
            Self::Io(_) => "OPG_STORE_IO",
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Poisoned
    }
}

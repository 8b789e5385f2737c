//! Schema registry error types
//!
//! Error codes:
//! - OPG_COLLECTION_NOT_FOUND (REJECT)
//! - OPG_COLLECTION_DUPLICATE (REJECT)
//! - OPG_SCHEMA_INVALID (REJECT)
//! - OPG_REGISTRY_MALFORMED (FATAL at startup)

use thiserror::Error;

/// Result type for schema registry operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema registry errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// Collection name does not resolve to a registered schema
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// A schema with the same normalized name is already registered
    #[error("Collection already registered: {0}")]
    DuplicateCollection(String),

    /// Schema definition is structurally invalid
    #[error("Invalid schema '{name}': {reason}")]
    InvalidSchema { name: String, reason: String },

    /// Registry file could not be read or parsed
    #[error("Malformed registry at {path}: {reason}")]
    Malformed { path: String, reason: String },
}

impl SchemaError {
    /// Create an invalid schema error
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed registry error
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::CollectionNotFound(_) => "OPG_COLLECTION_NOT_FOUND",
            Self::DuplicateCollection(_) => "OPG_COLLECTION_DUPLICATE",
            Self::InvalidSchema { .. } => "OPG_SCHEMA_INVALID",
            Self::Malformed { .. } => "OPG_REGISTRY_MALFORMED",
        }
    }
}

//! Read executor error types
//!
//! Error codes are those of the underlying failure:
//! - OPG_PLAN_* / OPG_STAGE_* for malformed plans
//! - OPG_COLLECTION_NOT_FOUND, OPG_SANITIZE_DEPTH from the sanitizer
//! - OPG_STORE_* from the document store
//! - OPG_READ_WRITE_PLAN when a write plan reaches the read path

use thiserror::Error;

use crate::plan::PlanError;
use crate::sanitizer::SanitizeError;
use crate::store::StoreError;

/// Result type for reads
pub type ReadResult<T> = Result<T, ReadError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Write plans cannot be executed as reads")]
    WritePlan,

    /// A step in a sequence failed; later steps did not run
    #[error("Step {index} failed: {source}")]
    Step {
        index: usize,
        #[source]
        source: Box<ReadError>,
    },
}

impl ReadError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Plan(e) => e.code(),
            Self::Sanitize(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::WritePlan => "OPG_READ_WRITE_PLAN",
            Self::Step { source, .. } => source.code(),
        }
    }

    /// True when the caller's plan is at fault rather than storage
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Plan(_) | Self::Sanitize(_) | Self::WritePlan => true,
            Self::Store(e) => matches!(e, StoreError::InvalidQuery(_) | StoreError::InvalidUpdate(_)),
            Self::Step { source, .. } => source.is_client_error(),
        }
    }

    pub(crate) fn at_step(self, index: usize) -> Self {
        Self::Step {
            index,
            source: Box::new(self),
        }
    }
}

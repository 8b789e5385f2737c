//! Engine error types
//!
//! Subsystem errors pass through with their own codes. Engine-level
//! codes:
//! - OPG_ENGINE_NO_PLAN: the turn has no plan and no producer can make one
//! - OPG_ENGINE_PRODUCER: the plan producer failed
//! - OPG_ENGINE_TASK: a gateway worker task failed

use thiserror::Error;

use crate::conversation::ConversationError;
use crate::executor::ReadError;
use crate::plan::PlanError;
use crate::sanitizer::SanitizeError;
use crate::schema::SchemaError;
use crate::write::WriteError;

/// Result type for engine calls
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error("Turn has no plan and no plan producer is configured")]
    NoPlan,

    #[error("Plan producer failed: {0}")]
    Producer(String),

    #[error("Worker task failed: {0}")]
    Task(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Plan(e) => e.code(),
            Self::Schema(e) => e.code(),
            Self::Sanitize(e) => e.code(),
            Self::Read(e) => e.code(),
            Self::Write(e) => e.code(),
            Self::Conversation(e) => e.code(),
            Self::NoPlan => "OPG_ENGINE_NO_PLAN",
            Self::Producer(_) => "OPG_ENGINE_PRODUCER",
            Self::Task(_) => "OPG_ENGINE_TASK",
        }
    }

    /// True when the caller's input is at fault
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Plan(_) | Self::Schema(_) | Self::Sanitize(_) | Self::NoPlan => true,
            Self::Read(e) => e.is_client_error(),
            Self::Write(e) => e.is_client_error(),
            Self::Conversation(_) | Self::Producer(_) | Self::Task(_) => false,
        }
    }
}

//! Plan model error types
//!
//! Error codes:
//! - OPG_PLAN_INVALID
//! - OPG_STAGE_INVALID
//! - OPG_STAGE_NOT_ALLOWED
//! - OPG_STEP_INVALID

use thiserror::Error;

/// Result type for plan parsing
pub type PlanResult<T> = Result<T, PlanError>;

/// Plan parsing errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Plan does not match any known shape
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// Pipeline stage is malformed
    #[error("Invalid stage: {0}")]
    InvalidStage(String),

    /// Pipeline stage operator is outside the allow-list
    #[error("Stage not allowed: {0}")]
    StageNotAllowed(String),

    /// A step in a sequence failed to parse
    #[error("Invalid step {index}: {reason}")]
    InvalidStep { index: usize, reason: String },
}

impl PlanError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPlan(_) => "OPG_PLAN_INVALID",
            Self::InvalidStage(_) => "OPG_STAGE_INVALID",
            Self::StageNotAllowed(_) => "OPG_STAGE_NOT_ALLOWED",
            Self::InvalidStep { .. } => "OPG_STEP_INVALID",
        }
    }
}

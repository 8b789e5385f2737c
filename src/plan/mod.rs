//! Operation plans
//!
//! Typed model of the untrusted plans a caller or a plan producer
//! submits: reads (find, aggregate, step sequences) and writes.

mod errors;
mod stage;
mod types;

pub use errors::{PlanError, PlanResult};
pub use stage::{Lookup, PipelineStage, Unwind};
pub use types::{
    AggregateStep, DeleteOp, FindStep, InsertData, InsertOp, OperationPlan, ReadStep, UpdateOp,
    WriteAction, WriteOp,
};

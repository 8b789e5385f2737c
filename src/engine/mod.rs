//! Engine
//!
//! Orchestrates the registry, executors and conversation store behind a
//! single `handle(turn)` entry point.
//!
//! # Routing
//!
//! - cancel turn → pending operation dropped
//! - plan-less turn with a pending operation → conversation merge
//! - read plan → read executor
//! - write plan → slot-filling, confirmation, write executor
//!
//! Guard and incompleteness results are replies, not errors.

mod errors;
mod gateway;
mod handler;
mod producer;
mod turn;

pub use errors::{EngineError, EngineResult};
pub use gateway::Gateway;
pub use handler::Engine;
pub use producer::{PlanProducer, StaticProducer};
pub use turn::{Reply, Turn};

//! Write Executor
//!
//! Turns a sanitized write plan into exactly one audited, transactional
//! mutation, or into a guard / dry-run / no-op outcome that leaves the
//! store untouched.

mod errors;
mod executor;
mod outcome;

pub use errors::{WriteError, WriteResult};
pub use executor::{WriteExecutor, AUTO_ID_PREFIX};
pub use outcome::{ExecutedWrite, WriteOptions, WriteOutcome};

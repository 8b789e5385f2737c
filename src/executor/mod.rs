//! Read Executor
//!
//! Consumes parsed read plans and returns documents.
//!
//! # Execution Flow
//!
//! 1. Resolve the collection (unknown names fail)
//! 2. Sanitize filters and `$match` stages
//! 3. Enforce the pipeline stage allow-list
//! 4. Query the store
//!
//! Step sequences run strictly in order and fail on the first invalid
//! step; results are positional.

mod errors;
mod executor;
mod result;

pub use errors::{ReadError, ReadResult};
pub use executor::{ReadExecutor, DEFAULT_LIMIT};
pub use result::ReadOutput;

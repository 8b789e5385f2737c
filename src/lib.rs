//! opguard - guarded execution of untrusted operation plans
//!
//! Plans produced outside the trust boundary (typically by a language
//! model) are parsed into closed variants, sanitized against a schema
//! registry, and executed against a document store. Writes are
//! validated, guarded, transactional and audited; incomplete writes are
//! parked per conversation until later turns fill them in.

pub mod audit;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod executor;
pub mod observability;
pub mod plan;
pub mod sanitizer;
pub mod schema;
pub mod store;
pub mod write;

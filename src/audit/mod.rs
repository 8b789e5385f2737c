//! Audit trail
//!
//! - Exactly one record per executed write
//! - Written inside the write's transaction, so a record exists if and
//!   only if the mutation committed
//! - Append-only: nothing in this crate updates or deletes records

mod query;
mod record;

pub use query::AuditQuery;
pub use record::{AuditRecord, AUDIT_COLLECTION};

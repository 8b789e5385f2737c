//! Observable lifecycle events
//!
//! Every log line the engine emits carries one of these as its
//! `event` field, so logs can be filtered by stable names.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    // Configuration
    ConfigLoaded,
    SchemasLoaded,

    // Plans
    PlanReceived,
    PlanRejected,

    // Reads
    ReadBegin,
    ReadComplete,

    // Writes
    WriteBegin,
    WriteCommitted,
    /// Transaction aborted; nothing was persisted
    WriteAborted,
    WriteRejected,
    GuardTriggered,
    DryRun,

    // Conversations
    PendingSaved,
    PendingMerged,
    PendingCleared,
    PendingExpired,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SchemasLoaded => "SCHEMAS_LOADED",

            Event::PlanReceived => "PLAN_RECEIVED",
            Event::PlanRejected => "PLAN_REJECTED",

            Event::ReadBegin => "READ_BEGIN",
            Event::ReadComplete => "READ_COMPLETE",

            Event::WriteBegin => "WRITE_BEGIN",
            Event::WriteCommitted => "WRITE_COMMITTED",
            Event::WriteAborted => "WRITE_ABORTED",
            Event::WriteRejected => "WRITE_REJECTED",
            Event::GuardTriggered => "GUARD_TRIGGERED",
            Event::DryRun => "DRY_RUN",

            Event::PendingSaved => "PENDING_SAVED",
            Event::PendingMerged => "PENDING_MERGED",
            Event::PendingCleared => "PENDING_CLEARED",
            Event::PendingExpired => "PENDING_EXPIRED",
        }
    }

    /// True for events that mean a request did not complete as asked
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::PlanRejected | Event::WriteAborted | Event::WriteRejected
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Conversation store
//!
//! One pending operation per conversation id. Callers go through the
//! [`ConversationStore`] trait so the in-memory map can be swapped for
//! an external store.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, Utc};
use serde_json::{Map, Value};

use super::errors::ConversationResult;
use super::pending::PendingOperation;
use crate::observability::Event;

pub trait ConversationStore: Send + Sync {
    /// Returns the live pending operation, if any.
    fn get(&self, id: &str) -> ConversationResult<Option<PendingOperation>>;

    /// Stores an operation, replacing any previous one for the id.
    fn put(&self, id: &str, op: PendingOperation) -> ConversationResult<()>;

    /// Removes and returns the operation for the id.
    fn delete(&self, id: &str) -> ConversationResult<Option<PendingOperation>>;

    /// Merges fields into the stored operation as one atomic step.
    ///
    /// Returns the merged operation, or `None` if nothing is pending.
    fn merge(
        &self,
        id: &str,
        fields: &Map<String, Value>,
    ) -> ConversationResult<Option<PendingOperation>>;

    /// Drops expired operations and returns how many were removed.
    fn purge_expired(&self) -> ConversationResult<usize>;
}

/// Mutex-guarded map with optional idle expiry
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    entries: Mutex<HashMap<String, PendingOperation>>,
    ttl: Option<Duration>,
}

impl InMemoryConversationStore {
    /// Creates a store whose entries never expire.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> ConversationResult<usize> {
        Ok(self.entries.lock()?.len())
    }

    pub fn is_empty(&self) -> ConversationResult<bool> {
        Ok(self.len()? == 0)
    }

    fn expired(&self, op: &PendingOperation) -> bool {
        self.ttl
            .is_some_and(|ttl| op.is_expired(Utc::now(), ttl))
    }

    /// Removes the entry under `id` if it has expired.
    fn evict_if_expired(&self, entries: &mut HashMap<String, PendingOperation>, id: &str) {
        if entries.get(id).is_some_and(|op| self.expired(op)) {
            entries.remove(id);
            tracing::info!(
                event = %Event::PendingExpired,
                conversation_id = id,
                "pending operation expired"
            );
        }
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn get(&self, id: &str) -> ConversationResult<Option<PendingOperation>> {
        let mut entries = self.entries.lock()?;
        self.evict_if_expired(&mut entries, id);
        Ok(entries.get(id).cloned())
    }

    fn put(&self, id: &str, op: PendingOperation) -> ConversationResult<()> {
        let missing = op.missing_fields.len();
        self.entries.lock()?.insert(id.to_string(), op);
        tracing::debug!(
            event = %Event::PendingSaved,
            conversation_id = id,
            missing,
            "pending operation saved"
        );
        Ok(())
    }

    fn delete(&self, id: &str) -> ConversationResult<Option<PendingOperation>> {
        let removed = self.entries.lock()?.remove(id);
        if removed.is_some() {
            tracing::debug!(
                event = %Event::PendingCleared,
                conversation_id = id,
                "pending operation cleared"
            );
        }
        Ok(removed)
    }

    fn merge(
        &self,
        id: &str,
        fields: &Map<String, Value>,
    ) -> ConversationResult<Option<PendingOperation>> {
        let mut entries = self.entries.lock()?;
        self.evict_if_expired(&mut entries, id);

        let Some(op) = entries.get_mut(id) else {
            return Ok(None);
        };
        op.merge(fields);
        tracing::debug!(
            event = %Event::PendingMerged,
            conversation_id = id,
            missing = op.missing_fields.len(),
            "pending operation merged"
        );
        Ok(Some(op.clone()))
    }

    fn purge_expired(&self) -> ConversationResult<usize> {
        let mut entries = self.entries.lock()?;
        let before = entries.len();
        entries.retain(|_, op| !self.expired(op));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::info!(event = %Event::PendingExpired, purged, "expired pending operations purged");
        }
        Ok(purged)
    }
}

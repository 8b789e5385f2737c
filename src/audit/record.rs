//! Audit records
//!
//! One record per executed write, inserted in the same transaction as
//! the mutation it describes. Records are never updated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::plan::WriteAction;

/// Default audit collection
pub const AUDIT_COLLECTION: &str = "auditlogs";

/// A single audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Record ID, stored as the document `_id`
    #[serde(rename = "_id")]
    pub id: Uuid,

    pub action: WriteAction,

    /// Normalized collection name
    pub collection: String,

    /// Sanitized filter (updates and deletes)
    #[serde(default)]
    pub filter: Option<Value>,

    /// Sanitized insert data or update body
    #[serde(default)]
    pub payload: Option<Value>,

    #[serde(default)]
    pub options: Map<String, Value>,

    /// Store-level result of the mutation
    #[serde(default)]
    pub result: Value,

    /// Matched documents before the mutation
    #[serde(default)]
    pub before: Option<Value>,

    /// Affected documents after the mutation; null for deletes
    #[serde(default)]
    pub after: Option<Value>,

    /// Request text that produced the write
    #[serde(default)]
    pub source_text: String,

    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(action: WriteAction, collection: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            collection: collection.into(),
            filter: None,
            payload: None,
            options: Map::new(),
            result: Value::Null,
            before: None,
            after: None,
            source_text: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_filter(mut self, filter: &Map<String, Value>) -> Self {
        self.filter = Some(Value::Object(filter.clone()));
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_options(mut self, options: &Map<String, Value>) -> Self {
        self.options = options.clone();
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = result;
        self
    }

    pub fn with_before(mut self, before: Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_after(mut self, after: Option<Value>) -> Self {
        self.after = after;
        self
    }

    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = text.into();
        self
    }

    /// Renders the record as a storable document.
    pub fn to_document(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(doc)) => doc,
            _ => Map::new(),
        }
    }

    /// Parses a stored document back into a record.
    pub fn from_document(doc: &Value) -> Option<Self> {
        serde_json::from_value(doc.clone()).ok()
    }
}

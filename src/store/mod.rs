//! Document store boundary
//!
//! The executors talk to storage only through [`DocumentStore`] and
//! [`StoreTransaction`]. Filters and updates reaching this layer have
//! already been sanitized; the store still rejects operators it does
//! not understand rather than ignoring them.
//!
//! The bundled [`InMemoryStore`] keeps collections in insertion order,
//! serializes writers by holding its write lock for the life of a
//! transaction, and enforces unique fields declared by the registry.

mod aggregate;
mod errors;
mod failpoint;
mod filter;
mod memory;
pub mod path;
mod snapshot;
mod sorter;
mod update;

pub use aggregate::{project, PipelineRunner};
pub use errors::{StoreError, StoreResult};
pub use failpoint::{points, FailPoints, FAIL_POINT_ENV};
pub use filter::FilterMatcher;
pub use memory::{InMemoryStore, MemoryTransaction};
pub use snapshot::Snapshot;
pub use sorter::{DocumentSorter, SortDirection, SortSpec};
pub use update::UpdateApplier;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::plan::PipelineStage;

/// Read options for `find`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Map<String, Value>>,
    pub sort: Option<Map<String, Value>>,
    pub skip: u64,
    pub limit: Option<u64>,
}

/// Read access to collections
pub trait DocumentStore: Send + Sync {
    /// Returns matching documents, sorted, paged and projected.
    fn find(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>>;

    /// Runs a validated pipeline.
    fn aggregate(&self, collection: &str, pipeline: &[PipelineStage]) -> StoreResult<Vec<Value>>;

    /// Counts matching documents.
    fn count(&self, collection: &str, filter: &Map<String, Value>) -> StoreResult<usize>;

    /// Starts a transaction. Only one transaction is open at a time.
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>>;
}

/// A unit of work that either commits entirely or leaves no trace.
///
/// Callers must finish every transaction with [`commit`](Self::commit)
/// or [`abort`](Self::abort).
pub trait StoreTransaction {
    /// Returns matching documents as seen inside the transaction.
    fn find(&self, collection: &str, filter: &Map<String, Value>) -> StoreResult<Vec<Value>>;

    /// Inserts documents, assigning `_id` where absent.
    fn insert_many(
        &mut self,
        collection: &str,
        documents: Vec<Map<String, Value>>,
    ) -> StoreResult<InsertSummary>;

    /// Applies an operator update to the first or every match.
    fn update(
        &mut self,
        collection: &str,
        filter: &Map<String, Value>,
        update: &Map<String, Value>,
        multi: bool,
    ) -> StoreResult<UpdateSummary>;

    /// Deletes the first or every match.
    fn delete(
        &mut self,
        collection: &str,
        filter: &Map<String, Value>,
        multi: bool,
    ) -> StoreResult<DeleteSummary>;

    fn commit(self: Box<Self>) -> StoreResult<()>;

    fn abort(self: Box<Self>);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertSummary {
    pub inserted_count: usize,
    pub inserted_ids: Vec<String>,
    /// Stored documents, `_id` included
    #[serde(skip)]
    pub documents: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    pub matched_count: usize,
    pub modified_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSummary {
    pub deleted_count: usize,
}

/// Driver-level result of one mutation, as recorded in the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOutcome {
    Insert(InsertSummary),
    Update(UpdateSummary),
    Delete(DeleteSummary),
}

impl RawOutcome {
    /// Number of documents the mutation touched
    pub fn affected(&self) -> usize {
        match self {
            Self::Insert(s) => s.inserted_count,
            Self::Update(s) => s.modified_count,
            Self::Delete(s) => s.deleted_count,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

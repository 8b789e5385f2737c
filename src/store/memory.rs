//! In-memory document store

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockWriteGuard};

use serde_json::{Map, Value};
use uuid::Uuid;

use super::aggregate::{project, PipelineRunner};
use super::errors::{StoreError, StoreResult};
use super::failpoint::{points, FailPoints};
use super::filter::FilterMatcher;
use super::sorter::{DocumentSorter, SortSpec};
use super::update::UpdateApplier;
use super::{
    DeleteSummary, DocumentStore, FindOptions, InsertSummary, StoreTransaction, UpdateSummary,
};
use crate::plan::PipelineStage;
use crate::schema::{SchemaRegistry, ID_FIELD};

type Collections = BTreeMap<String, Vec<Map<String, Value>>>;

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<Collections>,
    unique: HashMap<String, Vec<String>>,
    fail_points: FailPoints,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store enforcing the registry's unique fields.
    pub fn from_registry(registry: &SchemaRegistry) -> Self {
        let unique = registry
            .iter()
            .filter(|schema| !schema.unique.is_empty())
            .map(|schema| (schema.name.clone(), schema.unique.clone()))
            .collect();
        Self {
            unique,
            ..Self::default()
        }
    }

    pub fn with_unique(mut self, collection: &str, field: &str) -> Self {
        self.unique
            .entry(collection.to_string())
            .or_default()
            .push(field.to_string());
        self
    }

    pub fn with_fail_points(mut self, fail_points: FailPoints) -> Self {
        self.fail_points = fail_points;
        self
    }

    pub fn fail_points(&self) -> &FailPoints {
        &self.fail_points
    }

    /// Inserts documents outside the audited write path.
    pub fn seed(&self, collection: &str, documents: Vec<Value>) -> StoreResult<usize> {
        let docs = documents
            .into_iter()
            .map(|doc| match doc {
                Value::Object(map) => Ok(map),
                _ => Err(StoreError::InvalidUpdate("seed documents must be objects".into())),
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let mut txn = self.begin()?;
        match txn.insert_many(collection, docs) {
            Ok(summary) => {
                txn.commit()?;
                Ok(summary.inserted_count)
            }
            Err(e) => {
                txn.abort();
                Err(e)
            }
        }
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> StoreResult<usize> {
        let data = self.data.read()?;
        Ok(data.get(collection).map_or(0, Vec::len))
    }

    /// Copies every collection.
    pub fn export(&self) -> StoreResult<Collections> {
        Ok(self.data.read()?.clone())
    }

    /// Replaces every collection.
    pub fn import(&self, collections: Collections) -> StoreResult<()> {
        *self.data.write()? = collections;
        Ok(())
    }
}

impl DocumentStore for InMemoryStore {
    fn find(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>> {
        let data = self.data.read()?;
        let mut docs = matching(data.get(collection).map_or(&[][..], Vec::as_slice), filter)?;
        drop(data);

        if let Some(ref sort) = options.sort {
            DocumentSorter::sort(&mut docs, &SortSpec::parse(sort)?);
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        docs.into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match options.projection {
                Some(ref spec) => project(&doc, spec).map(Value::Object),
                None => Ok(Value::Object(doc)),
            })
            .collect()
    }

    fn aggregate(&self, collection: &str, pipeline: &[PipelineStage]) -> StoreResult<Vec<Value>> {
        let data = self.data.read()?;
        let source = data.get(collection).cloned().unwrap_or_default();
        let out = PipelineRunner::run(source, pipeline, |from| {
            data.get(from).cloned().unwrap_or_default()
        })?;
        Ok(out.into_iter().map(Value::Object).collect())
    }

    fn count(&self, collection: &str, filter: &Map<String, Value>) -> StoreResult<usize> {
        let data = self.data.read()?;
        Ok(matching(data.get(collection).map_or(&[][..], Vec::as_slice), filter)?.len())
    }

    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        let committed = self.data.write()?;
        Ok(Box::new(MemoryTransaction {
            committed,
            staged: BTreeMap::new(),
            unique: &self.unique,
            fail_points: &self.fail_points,
        }))
    }
}

/// Transaction over an [`InMemoryStore`].
///
/// Holds the store's write lock until it is committed or aborted.
/// Touched collections are copied into a staging area and swapped in
/// on commit.
pub struct MemoryTransaction<'s> {
    committed: RwLockWriteGuard<'s, Collections>,
    staged: Collections,
    unique: &'s HashMap<String, Vec<String>>,
    fail_points: &'s FailPoints,
}

impl<'s> MemoryTransaction<'s> {
    fn view(&self, collection: &str) -> &[Map<String, Value>] {
        self.staged
            .get(collection)
            .or_else(|| self.committed.get(collection))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Replaces a collection's staged contents after checking unique keys.
    fn stage(&mut self, collection: &str, docs: Vec<Map<String, Value>>) -> StoreResult<()> {
        let mut fields = vec![ID_FIELD.to_string()];
        if let Some(declared) = self.unique.get(collection) {
            fields.extend(declared.iter().cloned());
        }
        ensure_unique(collection, &fields, &docs)?;
        self.staged.insert(collection.to_string(), docs);
        Ok(())
    }
}

impl<'s> StoreTransaction for MemoryTransaction<'s> {
    fn find(&self, collection: &str, filter: &Map<String, Value>) -> StoreResult<Vec<Value>> {
        Ok(matching(self.view(collection), filter)?
            .into_iter()
            .map(Value::Object)
            .collect())
    }

    fn insert_many(
        &mut self,
        collection: &str,
        documents: Vec<Map<String, Value>>,
    ) -> StoreResult<InsertSummary> {
        self.fail_points.check(points::INSERT, Some(collection))?;

        let mut next = self.view(collection).to_vec();
        let mut summary = InsertSummary::default();

        for mut doc in documents {
            let id = match doc.get(ID_FIELD) {
                Some(Value::String(id)) => id.clone(),
                Some(other) => other.to_string(),
                None => {
                    let id = Uuid::new_v4().to_string();
                    doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                    id
                }
            };
            summary.inserted_ids.push(id);
            summary.documents.push(Value::Object(doc.clone()));
            next.push(doc);
        }
        summary.inserted_count = summary.inserted_ids.len();

        self.stage(collection, next)?;
        Ok(summary)
    }

    fn update(
        &mut self,
        collection: &str,
        filter: &Map<String, Value>,
        update: &Map<String, Value>,
        multi: bool,
    ) -> StoreResult<UpdateSummary> {
        self.fail_points.check(points::UPDATE, Some(collection))?;
        UpdateApplier::validate(update)?;

        let mut next = self.view(collection).to_vec();
        let mut summary = UpdateSummary::default();

        for doc in next.iter_mut() {
            if !FilterMatcher::matches(doc, filter)? {
                continue;
            }
            summary.matched_count += 1;
            if UpdateApplier::apply(doc, update)? {
                summary.modified_count += 1;
            }
            if !multi {
                break;
            }
        }

        if summary.modified_count > 0 {
            self.stage(collection, next)?;
        }
        Ok(summary)
    }

    fn delete(
        &mut self,
        collection: &str,
        filter: &Map<String, Value>,
        multi: bool,
    ) -> StoreResult<DeleteSummary> {
        self.fail_points.check(points::DELETE, Some(collection))?;

        let current = self.view(collection);
        let mut next = Vec::with_capacity(current.len());
        let mut deleted = 0;

        for doc in current {
            let take = (multi || deleted == 0) && FilterMatcher::matches(doc, filter)?;
            if take {
                deleted += 1;
            } else {
                next.push(doc.clone());
            }
        }

        if deleted > 0 {
            self.stage(collection, next)?;
        }
        Ok(DeleteSummary {
            deleted_count: deleted,
        })
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.fail_points.check(points::COMMIT, None)?;
        let staged = std::mem::take(&mut self.staged);
        self.committed.extend(staged);
        Ok(())
    }

    fn abort(self: Box<Self>) {
        // Dropping the staging area discards every change.
    }
}

fn matching(docs: &[Map<String, Value>], filter: &Map<String, Value>) -> StoreResult<Vec<Map<String, Value>>> {
    let mut out = Vec::new();
    for doc in docs {
        if FilterMatcher::matches(doc, filter)? {
            out.push(doc.clone());
        }
    }
    Ok(out)
}

fn ensure_unique(collection: &str, fields: &[String], docs: &[Map<String, Value>]) -> StoreResult<()> {
    for field in fields {
        let mut seen = HashSet::new();
        for doc in docs {
            let value = match doc.get(field) {
                None | Some(Value::Null) => continue,
                Some(v) => v.to_string(),
            };
            if !seen.insert(value.clone()) {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    field: field.clone(),
                    value,
                });
            }
        }
    }
    Ok(())
}

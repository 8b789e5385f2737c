//! Write executor
//!
//! State machine per call, terminal on every branch:
//! 1. `none` returns a no-op
//! 2. writes disabled fails
//! 3. collection, data and filter are validated and sanitized
//! 4. unscoped bulk mutations return a confirmation request
//! 5. dry runs return the sanitized plan
//! 6. the mutation, its snapshots and its audit record run in one
//!    transaction that either commits or is explicitly aborted

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::audit::{AuditRecord, AUDIT_COLLECTION};
use crate::observability::Event;
use crate::plan::{DeleteOp, InsertData, InsertOp, UpdateOp, WriteAction, WriteOp};
use crate::sanitizer::Sanitizer;
use crate::schema::{CollectionSchema, SchemaRegistry, ID_FIELD};
use crate::store::{DocumentStore, RawOutcome, StoreResult, StoreTransaction};

use super::errors::{WriteError, WriteResult};
use super::outcome::{ExecutedWrite, WriteOptions, WriteOutcome};

/// Prefix of generated identifiers for schemas with an auto-id field
pub const AUTO_ID_PREFIX: &str = "AUTO-";

/// A write that passed validation and sanitization
#[derive(Debug, Clone)]
struct PreparedWrite<'s> {
    action: WriteAction,
    schema: &'s CollectionSchema,
    body: Body,
    options: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Insert(Vec<Map<String, Value>>),
    Update {
        filter: Map<String, Value>,
        update: Map<String, Value>,
    },
    Delete {
        filter: Map<String, Value>,
    },
}

impl PreparedWrite<'_> {
    fn filter(&self) -> Option<&Map<String, Value>> {
        match &self.body {
            Body::Insert(_) => None,
            Body::Update { filter, .. } | Body::Delete { filter } => Some(filter),
        }
    }

    fn payload(&self) -> Option<Value> {
        match &self.body {
            Body::Insert(docs) => Some(Value::Array(
                docs.iter().cloned().map(Value::Object).collect(),
            )),
            Body::Update { update, .. } => Some(Value::Object(update.clone())),
            Body::Delete { .. } => None,
        }
    }

    /// The sanitized plan, in the same envelope the caller sent
    fn to_op(&self) -> WriteOp {
        let collection = Some(self.schema.name.clone());
        let options = self.options.clone();
        match (&self.body, self.action) {
            (Body::Insert(docs), action) => {
                let data = match (action, docs.as_slice()) {
                    (WriteAction::InsertOne, [doc]) => InsertData::One(doc.clone()),
                    _ => InsertData::Many(docs.clone()),
                };
                let op = InsertOp {
                    collection,
                    data: Some(data),
                    options,
                };
                match action {
                    WriteAction::InsertOne => WriteOp::InsertOne(op),
                    _ => WriteOp::InsertMany(op),
                }
            }
            (Body::Update { filter, update }, action) => {
                let op = UpdateOp {
                    collection,
                    filter: Some(filter.clone()),
                    update: Some(update.clone()),
                    options,
                };
                match action {
                    WriteAction::UpdateOne => WriteOp::UpdateOne(op),
                    _ => WriteOp::UpdateMany(op),
                }
            }
            (Body::Delete { filter }, action) => {
                let op = DeleteOp {
                    collection,
                    filter: Some(filter.clone()),
                    options,
                };
                match action {
                    WriteAction::DeleteOne => WriteOp::DeleteOne(op),
                    _ => WriteOp::DeleteMany(op),
                }
            }
        }
    }
}

/// Validates, guards and executes write plans
pub struct WriteExecutor<'a> {
    sanitizer: Sanitizer<'a>,
    store: &'a dyn DocumentStore,
    allow_writes: bool,
    audit_collection: String,
}

impl<'a> WriteExecutor<'a> {
    /// Creates an executor with writes disabled.
    pub fn new(registry: &'a SchemaRegistry, store: &'a dyn DocumentStore) -> Self {
        Self {
            sanitizer: Sanitizer::new(registry),
            store,
            allow_writes: false,
            audit_collection: AUDIT_COLLECTION.to_string(),
        }
    }

    pub fn allow_writes(mut self, allow: bool) -> Self {
        self.allow_writes = allow;
        self
    }

    pub fn with_audit_collection(mut self, collection: impl Into<String>) -> Self {
        self.audit_collection = collection.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.sanitizer = self.sanitizer.with_max_depth(max_depth);
        self
    }

    /// Runs one write plan.
    ///
    /// `source_text` is the request that produced the plan and ends up
    /// in the audit record.
    pub fn run(
        &self,
        source_text: &str,
        op: &WriteOp,
        options: WriteOptions,
    ) -> WriteResult<WriteOutcome> {
        let action = op.action();
        if action == WriteAction::None {
            return Ok(WriteOutcome::NoOp);
        }

        let prepared = match self.prepare(op) {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::info!(
                    event = %Event::WriteRejected,
                    action = %action,
                    code = e.code(),
                    error = %e,
                    "write rejected"
                );
                return Err(e);
            }
        };

        let plan = prepared.to_op().to_value();

        if action.is_bulk_mutation()
            && options.require_confirm
            && prepared.filter().is_some_and(Map::is_empty)
        {
            tracing::warn!(
                event = %Event::GuardTriggered,
                action = %action,
                collection = %prepared.schema.name,
                "unscoped bulk mutation needs confirmation"
            );
            return Ok(WriteOutcome::ConfirmRequired {
                reason: format!(
                    "{} without a filter would affect every document in '{}'",
                    action, prepared.schema.name
                ),
                plan,
            });
        }

        if options.dry_run {
            tracing::info!(
                event = %Event::DryRun,
                action = %action,
                collection = %prepared.schema.name,
                "dry run"
            );
            return Ok(WriteOutcome::DryRun { plan });
        }

        self.execute(source_text, &prepared).map(WriteOutcome::Executed)
    }

    fn prepare<'s>(&'s self, op: &WriteOp) -> WriteResult<PreparedWrite<'s>> {
        if !self.allow_writes {
            return Err(WriteError::WritesDisabled);
        }

        let collection = op
            .collection()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| WriteError::validation("missing collection"))?;
        let schema = self.sanitizer.schema(collection)?;

        let (body, options) = match op {
            WriteOp::InsertOne(insert) | WriteOp::InsertMany(insert) => {
                (self.prepare_insert(schema, insert)?, &insert.options)
            }
            WriteOp::UpdateOne(update) | WriteOp::UpdateMany(update) => {
                (self.prepare_update(schema, update)?, &update.options)
            }
            WriteOp::DeleteOne(delete) | WriteOp::DeleteMany(delete) => {
                let filter = self.prepare_filter(schema, delete.filter.as_ref())?;
                (Body::Delete { filter }, &delete.options)
            }
            WriteOp::None => return Err(WriteError::validation("no-op has no target")),
        };

        let prepared = PreparedWrite {
            action: op.action(),
            schema,
            body,
            options: options.clone(),
        };

        if prepared.action.is_single_mutation() && prepared.filter().is_some_and(Map::is_empty) {
            return Err(WriteError::validation(format!(
                "{} filter has no allowed fields",
                prepared.action
            )));
        }

        Ok(prepared)
    }

    fn prepare_insert(&self, schema: &CollectionSchema, op: &InsertOp) -> WriteResult<Body> {
        let docs = op
            .data
            .clone()
            .ok_or_else(|| WriteError::validation("insert requires data"))?
            .into_documents();
        if docs.is_empty() {
            return Err(WriteError::validation("insert requires at least one document"));
        }

        let docs = docs
            .iter()
            .map(|doc| {
                let clean = self.sanitizer.document(schema, doc)?;
                if clean.is_empty() {
                    return Err(WriteError::validation("document has no allowed fields"));
                }
                Ok(clean)
            })
            .collect::<WriteResult<Vec<_>>>()?;
        Ok(Body::Insert(docs))
    }

    fn prepare_update(&self, schema: &CollectionSchema, op: &UpdateOp) -> WriteResult<Body> {
        let filter = self.prepare_filter(schema, op.filter.as_ref())?;
        let raw = op
            .update
            .as_ref()
            .ok_or_else(|| WriteError::validation("update requires an update document"))?;

        let update = self.sanitizer.clean(schema, &as_operator_update(raw))?;
        if update.is_empty() {
            return Err(WriteError::validation("update has no allowed fields"));
        }
        crate::store::UpdateApplier::validate(&update)
            .map_err(|e| WriteError::validation(e.to_string()))?;

        Ok(Body::Update { filter, update })
    }

    fn prepare_filter(
        &self,
        schema: &CollectionSchema,
        filter: Option<&Map<String, Value>>,
    ) -> WriteResult<Map<String, Value>> {
        let filter = filter.ok_or_else(|| WriteError::validation("missing filter"))?;
        Ok(self.sanitizer.clean(schema, filter)?)
    }

    fn execute(&self, source_text: &str, prepared: &PreparedWrite<'_>) -> WriteResult<ExecutedWrite> {
        let collection = prepared.schema.name.as_str();
        tracing::debug!(
            event = %Event::WriteBegin,
            action = %prepared.action,
            collection,
            "write transaction started"
        );

        let mut txn = self.store.begin()?;
        let result = match self.apply(txn.as_mut(), source_text, prepared) {
            Ok(executed) => txn.commit().map(|()| executed),
            Err(e) => {
                txn.abort();
                Err(e)
            }
        };

        match result {
            Ok(executed) => {
                tracing::info!(
                    event = %Event::WriteCommitted,
                    action = %prepared.action,
                    collection,
                    affected = executed.affected,
                    audit_id = %executed.audit_id,
                    "write committed"
                );
                Ok(executed)
            }
            Err(e) => {
                tracing::warn!(
                    event = %Event::WriteAborted,
                    action = %prepared.action,
                    collection,
                    code = e.code(),
                    error = %e,
                    "write aborted"
                );
                Err(e.into())
            }
        }
    }

    /// Mutation, snapshots and audit record, all through one transaction.
    fn apply(
        &self,
        txn: &mut dyn StoreTransaction,
        source_text: &str,
        prepared: &PreparedWrite<'_>,
    ) -> StoreResult<ExecutedWrite> {
        let schema = prepared.schema;
        let collection = schema.name.as_str();
        let action = prepared.action;

        let (raw, inserted, before, after) = match &prepared.body {
            Body::Insert(docs) => {
                let docs = docs.iter().cloned().map(|doc| with_auto_id(schema, doc)).collect();
                let summary = txn.insert_many(collection, docs)?;
                let inserted = summary.documents.clone();
                let after = Value::Array(inserted.clone());
                (RawOutcome::Insert(summary), Some(inserted), None, Some(after))
            }
            Body::Update { filter, update } => {
                let before = snapshot(txn, collection, filter, action.is_single_mutation())?;
                let summary = txn.update(collection, filter, update, !action.is_single_mutation())?;
                let after = txn.find(collection, &by_ids(&before))?;
                (
                    RawOutcome::Update(summary),
                    None,
                    Some(Value::Array(before)),
                    Some(Value::Array(after)),
                )
            }
            Body::Delete { filter } => {
                let before = snapshot(txn, collection, filter, action.is_single_mutation())?;
                let summary = txn.delete(collection, filter, !action.is_single_mutation())?;
                (RawOutcome::Delete(summary), None, Some(Value::Array(before)), None)
            }
        };

        let mut record = AuditRecord::new(action, collection)
            .with_options(&prepared.options)
            .with_result(raw.to_value())
            .with_after(after.clone())
            .with_source_text(source_text);
        if let Some(filter) = prepared.filter() {
            record = record.with_filter(filter);
        }
        if let Some(payload) = prepared.payload() {
            record = record.with_payload(payload);
        }
        if let Some(before) = &before {
            record = record.with_before(before.clone());
        }
        txn.insert_many(&self.audit_collection, vec![record.to_document()])?;

        Ok(ExecutedWrite {
            action,
            collection: collection.to_string(),
            affected: raw.affected(),
            inserted,
            before,
            after,
            raw,
            audit_id: record.id,
        })
    }
}

/// Treats plain field assignments as a `$set` body.
///
/// Operator keys pass through; plain keys are merged into `$set`.
fn as_operator_update(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    let mut set = Map::new();
    for (key, value) in raw {
        if key.starts_with('$') {
            out.insert(key.clone(), value.clone());
        } else {
            set.insert(key.clone(), value.clone());
        }
    }
    if !set.is_empty() {
        match out.get_mut("$set") {
            Some(Value::Object(existing)) => {
                for (key, value) in set {
                    existing.entry(key).or_insert(value);
                }
            }
            _ => {
                out.insert("$set".into(), Value::Object(set));
            }
        }
    }
    out
}

fn with_auto_id(schema: &CollectionSchema, mut doc: Map<String, Value>) -> Map<String, Value> {
    if let Some(field) = &schema.auto_id {
        let missing = doc
            .get(field)
            .map_or(true, |v| v.is_null() || v.as_str() == Some(""));
        if missing {
            doc.insert(
                field.clone(),
                Value::String(format!("{}{}", AUTO_ID_PREFIX, Uuid::new_v4())),
            );
        }
    }
    doc
}

/// Matching documents, limited to the first one for single mutations
fn snapshot(
    txn: &dyn StoreTransaction,
    collection: &str,
    filter: &Map<String, Value>,
    single: bool,
) -> StoreResult<Vec<Value>> {
    let mut docs = txn.find(collection, filter)?;
    if single {
        docs.truncate(1);
    }
    Ok(docs)
}

fn by_ids(docs: &[Value]) -> Map<String, Value> {
    let ids: Vec<Value> = docs
        .iter()
        .filter_map(|doc| doc.get(ID_FIELD).cloned())
        .collect();
    let mut filter = Map::new();
    filter.insert(ID_FIELD.to_string(), json!({"$in": ids}));
    filter
}

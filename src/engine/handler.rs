//! Engine
//!
//! Routes each turn:
//! 1. A cancel turn drops the conversation's pending operation; a turn
//!    without a plan, in a conversation with a pending operation,
//!    continues that operation
//! 2. Otherwise the plan (given, or produced from text) is parsed
//! 3. Reads go to the read executor
//! 4. Writes go through slot-filling and confirmation, then to the
//!    write executor

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::conversation::{
    infer_for, ConversationStore, InMemoryConversationStore, PendingOperation,
};
use crate::executor::{ReadExecutor, ReadOutput};
use crate::observability::{Event, MetricsRegistry};
use crate::plan::{OperationPlan, WriteOp};
use crate::sanitizer::Sanitizer;
use crate::schema::{CollectionSchema, SchemaRegistry};
use crate::store::DocumentStore;
use crate::write::{WriteError, WriteExecutor, WriteOptions, WriteOutcome};

use super::errors::{EngineError, EngineResult};
use super::producer::PlanProducer;
use super::turn::{Reply, Turn};

pub struct Engine {
    registry: SchemaRegistry,
    store: Arc<dyn DocumentStore>,
    conversations: Arc<dyn ConversationStore>,
    producer: Option<Arc<dyn PlanProducer>>,
    metrics: Arc<MetricsRegistry>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(registry: SchemaRegistry, store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        let conversations = Arc::new(InMemoryConversationStore::with_ttl(config.pending_ttl()));
        Self {
            registry,
            store,
            conversations,
            producer: None,
            metrics: Arc::new(MetricsRegistry::new()),
            config,
        }
    }

    pub fn with_conversations(mut self, conversations: Arc<dyn ConversationStore>) -> Self {
        self.conversations = conversations;
        self
    }

    pub fn with_producer(mut self, producer: Arc<dyn PlanProducer>) -> Self {
        self.producer = Some(producer);
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn conversations(&self) -> &dyn ConversationStore {
        self.conversations.as_ref()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reader(&self) -> ReadExecutor<'_> {
        ReadExecutor::new(&self.registry, self.store())
            .with_default_limit(self.config.default_limit)
            .with_max_depth(self.config.max_depth)
    }

    pub fn writer(&self) -> WriteExecutor<'_> {
        WriteExecutor::new(&self.registry, self.store())
            .allow_writes(self.config.allow_writes)
            .with_audit_collection(self.config.audit_collection.clone())
            .with_max_depth(self.config.max_depth)
    }

    fn sanitizer(&self) -> Sanitizer<'_> {
        Sanitizer::new(&self.registry).with_max_depth(self.config.max_depth)
    }

    /// Handles one turn.
    pub fn handle(&self, turn: &Turn) -> EngineResult<Reply> {
        let expired = self.conversations.purge_expired()?;
        self.metrics.add_pending_expired(expired as u64);

        if turn.cancel {
            return self.cancel(turn);
        }

        if turn.plan.is_none() {
            if let Some(id) = turn.conversation_id.as_deref() {
                if let Some(pending) = self.conversations.get(id)? {
                    return self.continue_pending(id, pending, turn);
                }
            }
        }

        let plan = match self.plan_for(turn) {
            Ok(plan) => plan,
            Err(e) => {
                self.metrics.increment_plans_rejected();
                tracing::info!(event = %Event::PlanRejected, code = e.code(), error = %e, "plan rejected");
                return Err(e);
            }
        };
        tracing::debug!(event = %Event::PlanReceived, mode = plan.kind(), "plan received");

        match plan {
            OperationPlan::Write { operation } => self.start_write(turn, &operation),
            read => self.read(&read).map(Reply::Read),
        }
    }

    /// Executes a read plan.
    pub fn read(&self, plan: &OperationPlan) -> EngineResult<ReadOutput> {
        match self.reader().run(plan) {
            Ok(output) => {
                self.metrics.increment_reads();
                Ok(output)
            }
            Err(e) => {
                self.metrics.increment_plans_rejected();
                Err(e.into())
            }
        }
    }

    /// Runs a write plan directly, without slot-filling.
    pub fn write(&self, text: &str, op: &WriteOp, options: WriteOptions) -> EngineResult<WriteOutcome> {
        let result = self.writer().run(text, op, options);
        match &result {
            Ok(WriteOutcome::Executed(_)) => self.metrics.increment_writes_committed(),
            Ok(WriteOutcome::ConfirmRequired { .. }) => self.metrics.increment_guards(),
            Ok(WriteOutcome::DryRun { .. }) => self.metrics.increment_dry_runs(),
            Ok(WriteOutcome::NoOp) => {}
            Err(WriteError::Store(_)) => self.metrics.increment_writes_aborted(),
            Err(_) => self.metrics.increment_writes_rejected(),
        }
        Ok(result?)
    }

    fn plan_for(&self, turn: &Turn) -> EngineResult<OperationPlan> {
        let raw = match (&turn.plan, &self.producer) {
            (Some(plan), _) => plan.clone(),
            (None, Some(producer)) => producer.produce(&turn.text)?,
            (None, None) => return Err(EngineError::NoPlan),
        };
        Ok(OperationPlan::from_value(&raw)?)
    }

    fn options(&self, turn: &Turn) -> WriteOptions {
        WriteOptions {
            dry_run: turn.dry_run,
            require_confirm: self.config.require_confirm && !turn.force,
        }
    }

    fn start_write(&self, turn: &Turn, op: &WriteOp) -> EngineResult<Reply> {
        // No-ops, missing filters and unknown collections are reported
        // by the executor.
        let schema = match op.collection().map(|c| self.registry.resolve(c)) {
            Some(Ok(schema)) if !lacks_filter(op) => schema,
            _ => return self.write(&turn.text, op, self.options(turn)).map(Reply::Write),
        };
        let Some(mut pending) = PendingOperation::from_write(op, schema) else {
            return self.write(&turn.text, op, self.options(turn)).map(Reply::Write);
        };
        if !turn.text.trim().is_empty() {
            pending = pending.with_summary(turn.text.trim());
        }

        let fields = self.turn_fields(turn, &pending, schema)?;
        if !fields.is_empty() {
            pending.merge(&fields);
        }

        if !pending.is_complete() || !turn.confirm {
            if let Some(id) = turn.conversation_id.as_deref() {
                self.conversations.put(id, pending.clone())?;
                self.metrics.increment_pending_saved();
            }
            return Ok(self.hold(pending));
        }

        // A fresh plan replaces whatever the conversation was holding.
        if let Some(id) = turn.conversation_id.as_deref() {
            self.conversations.put(id, pending.clone())?;
            self.metrics.increment_pending_saved();
        }
        self.execute(turn.conversation_id.as_deref(), &pending, turn)
    }

    fn continue_pending(&self, id: &str, pending: PendingOperation, turn: &Turn) -> EngineResult<Reply> {
        let schema = self.registry.resolve(&pending.collection)?;
        let fields = self.turn_fields(turn, &pending, schema)?;

        let pending = match self.conversations.merge(id, &fields)? {
            Some(merged) => {
                if !fields.is_empty() {
                    self.metrics.increment_pending_saved();
                }
                merged
            }
            None => pending,
        };

        if !pending.is_complete() || !turn.confirm {
            return Ok(self.hold(pending));
        }

        self.execute(Some(id), &pending, turn)
    }

    /// Runs a complete, confirmed operation. The conversation entry is
    /// cleared only once the write has executed.
    fn execute(&self, id: Option<&str>, pending: &PendingOperation, turn: &Turn) -> EngineResult<Reply> {
        let outcome = self.write(&turn.text, &pending.to_write_op(), self.options(turn))?;
        if let Some(id) = id {
            if outcome.is_executed() && self.conversations.delete(id)?.is_some() {
                self.metrics.increment_pending_cleared();
            }
        }
        Ok(Reply::Write(outcome))
    }

    fn cancel(&self, turn: &Turn) -> EngineResult<Reply> {
        let pending = match turn.conversation_id.as_deref() {
            Some(id) => self.conversations.delete(id)?,
            None => None,
        };
        if pending.is_some() {
            self.metrics.increment_pending_cleared();
        }
        Ok(Reply::Cancelled { pending })
    }

    fn hold(&self, pending: PendingOperation) -> Reply {
        if pending.is_complete() {
            Reply::AwaitingConfirmation { pending }
        } else {
            Reply::missing(&pending)
        }
    }

    /// Structured fields, alias-resolved and allow-listed, or values
    /// inferred from the text when the turn carries none.
    fn turn_fields(
        &self,
        turn: &Turn,
        pending: &PendingOperation,
        schema: &CollectionSchema,
    ) -> EngineResult<Map<String, Value>> {
        match &turn.fields {
            Some(fields) if !fields.is_empty() => Ok(self.sanitizer().document(schema, fields)?),
            _ => Ok(infer_for(&turn.text, pending, schema)),
        }
    }
}

fn lacks_filter(op: &WriteOp) -> bool {
    match op {
        WriteOp::UpdateOne(update) | WriteOp::UpdateMany(update) => update.filter.is_none(),
        WriteOp::DeleteOne(delete) | WriteOp::DeleteMany(delete) => delete.filter.is_none(),
        WriteOp::InsertOne(_) | WriteOp::InsertMany(_) | WriteOp::None => false,
    }
}

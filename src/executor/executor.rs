//! Read executor
//!
//! Execution flow for one step:
//! 1. Resolve the collection through the registry
//! 2. Sanitize the filter (or every `$match` stage)
//! 3. Reduce projection and sort to allow-listed fields
//! 4. Apply skip and limit (default limit when unset)
//! 5. Hand the result to the store
//!
//! Reads never mutate, so plans may be retried or run concurrently.

use serde_json::{Map, Value};

use crate::observability::Event;
use crate::plan::{AggregateStep, FindStep, OperationPlan, PipelineStage, PlanError, ReadStep};
use crate::sanitizer::{Sanitizer, DEFAULT_MAX_DEPTH};
use crate::schema::{CollectionSchema, SchemaRegistry};
use crate::store::{DocumentStore, FindOptions};

use super::errors::{ReadError, ReadResult};
use super::result::ReadOutput;

/// Limit applied when a find does not set one
pub const DEFAULT_LIMIT: u64 = 200;

/// Executes find, aggregate and step-sequence plans
pub struct ReadExecutor<'a> {
    sanitizer: Sanitizer<'a>,
    store: &'a dyn DocumentStore,
    default_limit: u64,
}

impl<'a> ReadExecutor<'a> {
    pub fn new(registry: &'a SchemaRegistry, store: &'a dyn DocumentStore) -> Self {
        Self {
            sanitizer: Sanitizer::new(registry).with_max_depth(DEFAULT_MAX_DEPTH),
            store,
            default_limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.sanitizer = self.sanitizer.with_max_depth(max_depth);
        self
    }

    /// Executes a read plan.
    pub fn run(&self, plan: &OperationPlan) -> ReadResult<ReadOutput> {
        tracing::debug!(event = %Event::ReadBegin, mode = plan.kind(), "read started");

        let output = match plan {
            OperationPlan::Find(step) => ReadOutput::Single(self.find(step)?),
            OperationPlan::Aggregate(step) => ReadOutput::Single(self.aggregate(step)?),
            OperationPlan::Steps { steps } => ReadOutput::Sequence(self.steps(steps)?),
            OperationPlan::Write { .. } => return Err(ReadError::WritePlan),
        };

        tracing::info!(
            event = %Event::ReadComplete,
            mode = plan.kind(),
            documents = output.len(),
            "read complete"
        );
        Ok(output)
    }

    /// Runs steps strictly in order; the first failure stops the sequence.
    pub fn steps(&self, steps: &[ReadStep]) -> ReadResult<Vec<Vec<Value>>> {
        steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let docs = match step {
                    ReadStep::Find(find) => self.find(find),
                    ReadStep::Aggregate(agg) => self.aggregate(agg),
                };
                docs.map_err(|e| e.at_step(index))
            })
            .collect()
    }

    pub fn find(&self, step: &FindStep) -> ReadResult<Vec<Value>> {
        let schema = self.sanitizer.schema(&step.collection)?;
        let filter = match &step.filter {
            Some(raw) => self.sanitizer.clean(schema, raw)?,
            None => Map::new(),
        };

        let options = FindOptions {
            projection: step
                .projection
                .as_ref()
                .and_then(|p| self.sanitizer.projection(schema, p)),
            sort: step.sort.as_ref().and_then(|s| self.sanitizer.sort(schema, s)),
            skip: step.skip.unwrap_or(0),
            limit: Some(step.limit.unwrap_or(self.default_limit)),
        };

        let shown = Value::Object(filter.clone());
        tracing::debug!(
            event = %Event::PlanReceived,
            collection = %schema.name,
            filter = %shown,
            "find sanitized"
        );

        Ok(self.store.find(&schema.name, &filter, &options)?)
    }

    pub fn aggregate(&self, step: &AggregateStep) -> ReadResult<Vec<Value>> {
        let schema = self.sanitizer.schema(&step.collection)?;
        let pipeline = self.clean_pipeline(schema, &step.pipeline)?;
        Ok(self.store.aggregate(&schema.name, &pipeline)?)
    }

    /// Validates and sanitizes raw pipeline stages.
    ///
    /// `$match` bodies are sanitized against the pipeline's collection,
    /// `$lookup` sources must be registered and are stored by their
    /// normalized name, join fields must be allow-listed on their side, and an empty `$project` becomes `{_id: 0}`.
    pub fn clean_pipeline(
        &self,
        schema: &CollectionSchema,
        raw: &[Value],
    ) -> ReadResult<Vec<PipelineStage>> {
        raw.iter()
            .map(|stage| -> ReadResult<PipelineStage> {
                let stage = match PipelineStage::parse(stage)? {
                    PipelineStage::Match(body) => {
                        PipelineStage::Match(self.sanitizer.clean(schema, &body)?)
                    }
                    PipelineStage::Lookup(mut lookup) => {
                        let foreign = self.sanitizer.schema(&lookup.from)?;
                        if !schema.allows_projection(&lookup.local_field) {
                            return Err(PlanError::InvalidStage(format!(
                                "$lookup localField '{}' is not allowed on {}",
                                lookup.local_field, schema.name
                            ))
                            .into());
                        }
                        if !foreign.allows_projection(&lookup.foreign_field) {
                            return Err(PlanError::InvalidStage(format!(
                                "$lookup foreignField '{}' is not allowed on {}",
                                lookup.foreign_field, foreign.name
                            ))
                            .into());
                        }
                        lookup.from = foreign.name.clone();
                        PipelineStage::Lookup(lookup)
                    }
                    PipelineStage::Project(body) if body.is_empty() => {
                        let mut hide_id = Map::new();
                        hide_id.insert("_id".to_string(), Value::from(0));
                        PipelineStage::Project(hide_id)
                    }
                    other => other,
                };
                Ok(stage)
            })
            .collect()
    }
}

//! Plan Sanitizer
//!
//! Reduces untrusted filter, update, projection and document bodies to
//! what a collection's schema allows. Sanitization is a pure function of
//! the registry and its input:
//!
//! - keys resolve through the alias map before allow-listing
//! - non-allowed field keys are dropped silently
//! - `$`-prefixed operator keys are kept and their operands recursed
//! - clauses left empty are pruned
//! - output is a fixed point: sanitizing it again changes nothing
//!
//! Recursion is bounded; input nested deeper than the bound is rejected
//! rather than truncated.

mod errors;

pub use errors::{SanitizeError, SanitizeResult};

use serde_json::{Map, Value};

use crate::schema::{CollectionSchema, SchemaRegistry};

/// Default nesting bound
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Operators whose operand is a list of clauses
const LOGICAL_OPERATORS: [&str; 3] = ["$and", "$or", "$nor"];

/// Schema-driven sanitizer
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer<'r> {
    registry: &'r SchemaRegistry,
    max_depth: usize,
}

impl<'r> Sanitizer<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    /// Resolves a raw collection name.
    pub fn schema(&self, collection: &str) -> SanitizeResult<&'r CollectionSchema> {
        Ok(self.registry.resolve(collection)?)
    }

    /// Sanitizes a filter or update body for a raw collection name.
    pub fn sanitize(&self, collection: &str, raw: &Map<String, Value>) -> SanitizeResult<Map<String, Value>> {
        let schema = self.schema(collection)?;
        self.clean(schema, raw)
    }

    /// Sanitizes a filter or update body against a resolved schema.
    pub fn clean(&self, schema: &CollectionSchema, raw: &Map<String, Value>) -> SanitizeResult<Map<String, Value>> {
        self.clean_object(schema, raw, 0)
    }

    /// Sanitizes a document about to be stored.
    ///
    /// Same as [`clean`](Self::clean), with top-level operator keys
    /// removed so they can never become stored field names.
    pub fn document(&self, schema: &CollectionSchema, raw: &Map<String, Value>) -> SanitizeResult<Map<String, Value>> {
        let mut doc = self.clean(schema, raw)?;
        doc.retain(|key, _| !key.starts_with('$'));
        Ok(doc)
    }

    /// Reduces a projection to allow-listed fields plus `_id`.
    ///
    /// Returns `None` when nothing survives, meaning "no projection".
    pub fn projection(&self, schema: &CollectionSchema, raw: &Map<String, Value>) -> Option<Map<String, Value>> {
        reduce_keys(schema, raw)
    }

    /// Reduces sort keys the same way as projections.
    pub fn sort(&self, schema: &CollectionSchema, raw: &Map<String, Value>) -> Option<Map<String, Value>> {
        reduce_keys(schema, raw)
    }

    fn clean_object(
        &self,
        schema: &CollectionSchema,
        obj: &Map<String, Value>,
        depth: usize,
    ) -> SanitizeResult<Map<String, Value>> {
        if depth > self.max_depth {
            return Err(SanitizeError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }

        let mut out = Map::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                if let Some(operand) = self.clean_operand(schema, key, value, depth + 1)? {
                    out.insert(key.clone(), operand);
                }
                continue;
            }

            let field = schema.resolve(key);
            if !schema.allows(field) {
                continue;
            }

            let cleaned = match value {
                Value::Object(inner) => {
                    let inner = self.clean_object(schema, inner, depth + 1)?;
                    if inner.is_empty() {
                        continue;
                    }
                    Value::Object(inner)
                }
                other => other.clone(),
            };
            out.insert(field.to_string(), cleaned);
        }

        Ok(out)
    }

    fn clean_operand(
        &self,
        schema: &CollectionSchema,
        operator: &str,
        value: &Value,
        depth: usize,
    ) -> SanitizeResult<Option<Value>> {
        match value {
            Value::Object(inner) => {
                let inner = self.clean_object(schema, inner, depth)?;
                Ok((!inner.is_empty()).then_some(Value::Object(inner)))
            }
            Value::Array(items) if LOGICAL_OPERATORS.contains(&operator) => {
                if depth > self.max_depth {
                    return Err(SanitizeError::DepthExceeded {
                        max_depth: self.max_depth,
                    });
                }
                let mut clauses = Vec::with_capacity(items.len());
                for item in items {
                    // Logical operands hold clauses only; scalars are dropped.
                    if let Value::Object(clause) = item {
                        let clause = self.clean_object(schema, clause, depth + 1)?;
                        if !clause.is_empty() {
                            clauses.push(Value::Object(clause));
                        }
                    }
                }
                Ok((!clauses.is_empty()).then_some(Value::Array(clauses)))
            }
            // Operand values such as `$in` lists and `$regex` patterns.
            other => Ok(Some(other.clone())),
        }
    }
}

fn reduce_keys(schema: &CollectionSchema, raw: &Map<String, Value>) -> Option<Map<String, Value>> {
    let out: Map<String, Value> = raw
        .iter()
        .filter_map(|(key, value)| {
            let field = schema.resolve(key);
            schema
                .allows_projection(field)
                .then(|| (field.to_string(), value.clone()))
        })
        .collect();
    (!out.is_empty()).then_some(out)
}

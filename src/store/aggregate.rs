//! Aggregation pipeline evaluation
//!
//! Runs an already validated stage list over a collection's documents.
//! Expressions are limited to field references (`"$field"`), literals
//! and objects of those.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::errors::{StoreError, StoreResult};
use super::filter::{eq_match, values_equal, FilterMatcher};
use super::path;
use super::sorter::{compare_values, DocumentSorter, SortSpec};
use crate::plan::{Lookup, PipelineStage, Unwind};
use crate::schema::ID_FIELD;

/// Evaluates aggregation pipelines
pub struct PipelineRunner;

impl PipelineRunner {
    /// Runs `stages` over `docs`.
    ///
    /// `foreign` resolves a `$lookup` source collection to its documents.
    pub fn run<F>(
        mut docs: Vec<Map<String, Value>>,
        stages: &[PipelineStage],
        foreign: F,
    ) -> StoreResult<Vec<Map<String, Value>>>
    where
        F: Fn(&str) -> Vec<Map<String, Value>>,
    {
        for stage in stages {
            docs = match stage {
                PipelineStage::Match(filter) => {
                    let mut kept = Vec::with_capacity(docs.len());
                    for doc in docs {
                        if FilterMatcher::matches(&doc, filter)? {
                            kept.push(doc);
                        }
                    }
                    kept
                }
                PipelineStage::Project(spec) => docs
                    .iter()
                    .map(|doc| project(doc, spec))
                    .collect::<StoreResult<Vec<_>>>()?,
                PipelineStage::Group(spec) => group(&docs, spec)?,
                PipelineStage::Sort(spec) => {
                    DocumentSorter::sort(&mut docs, &SortSpec::parse(spec)?);
                    docs
                }
                PipelineStage::Limit(n) => {
                    docs.truncate(usize::try_from(*n).unwrap_or(usize::MAX));
                    docs
                }
                PipelineStage::Skip(n) => docs
                    .into_iter()
                    .skip(usize::try_from(*n).unwrap_or(usize::MAX))
                    .collect(),
                PipelineStage::Unwind(spec) => unwind(docs, spec),
                PipelineStage::Lookup(spec) => lookup(docs, spec, &foreign(&spec.from)),
            };
        }
        Ok(docs)
    }
}

/// Applies a projection in inclusion or exclusion mode.
///
/// Inclusion keeps listed fields plus `_id` (unless `_id: 0`); string
/// values starting with `$` copy from another field. Exclusion removes
/// listed fields. The two modes cannot be mixed, except for `_id`.
pub fn project(doc: &Map<String, Value>, spec: &Map<String, Value>) -> StoreResult<Map<String, Value>> {
    let mut include = false;
    let mut exclude = false;
    for (field, value) in spec {
        if field == ID_FIELD {
            continue;
        }
        if is_exclusion(value) {
            exclude = true;
        } else {
            include = true;
        }
    }
    if include && exclude {
        return Err(StoreError::InvalidQuery(
            "projection cannot mix inclusion and exclusion".into(),
        ));
    }

    let drop_id = spec.get(ID_FIELD).is_some_and(is_exclusion);

    if !include {
        let mut out = doc.clone();
        for (field, value) in spec {
            if is_exclusion(value) {
                path::remove(&mut out, field);
            }
        }
        return Ok(out);
    }

    let mut out = Map::new();
    if !drop_id {
        if let Some(id) = doc.get(ID_FIELD) {
            out.insert(ID_FIELD.to_string(), id.clone());
        }
    }
    for (field, value) in spec {
        if field == ID_FIELD {
            continue;
        }
        let projected = match value {
            Value::Object(_) => {
                return Err(StoreError::InvalidQuery(format!(
                    "unsupported projection expression for '{}'",
                    field
                )))
            }
            Value::String(_) => evaluate(doc, value),
            _ => path::get(doc, field).cloned(),
        };
        if let Some(projected) = projected {
            path::set(&mut out, field, projected);
        }
    }
    Ok(out)
}

fn is_exclusion(value: &Value) -> bool {
    matches!(value, Value::Bool(false)) || value.as_f64() == Some(0.0)
}

/// Evaluates a field reference, literal, or object of expressions.
fn evaluate(doc: &Map<String, Value>, expr: &Value) -> Option<Value> {
    match expr {
        Value::String(s) if s.starts_with('$') => path::get(doc, &s[1..]).cloned(),
        Value::Object(fields) => Some(Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), evaluate(doc, v).unwrap_or(Value::Null)))
                .collect(),
        )),
        literal => Some(literal.clone()),
    }
}

/// Running state of one `$group` accumulator
#[derive(Debug, Clone)]
enum Accumulator {
    Sum { int: i64, float: f64, is_float: bool },
    Avg { total: f64, count: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
    Count(u64),
    Push(Vec<Value>),
    AddToSet(Vec<Value>),
    First(Option<Option<Value>>),
    Last(Option<Value>),
}

impl Accumulator {
    fn parse(field: &str, spec: &Value) -> StoreResult<(Self, Value)> {
        let (op, expr) = spec
            .as_object()
            .filter(|o| o.len() == 1)
            .and_then(|o| o.iter().next())
            .ok_or_else(|| {
                StoreError::InvalidQuery(format!(
                    "$group field '{}' must be a single accumulator object",
                    field
                ))
            })?;

        let acc = match op.as_str() {
            "$sum" => Self::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            "$avg" => Self::Avg { total: 0.0, count: 0 },
            "$min" => Self::Min(None),
            "$max" => Self::Max(None),
            "$count" => Self::Count(0),
            "$push" => Self::Push(Vec::new()),
            "$addToSet" => Self::AddToSet(Vec::new()),
            "$first" => Self::First(None),
            "$last" => Self::Last(None),
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "unsupported accumulator {}",
                    other
                )))
            }
        };
        Ok((acc, expr.clone()))
    }

    fn fold(&mut self, value: Option<Value>) {
        match self {
            Self::Sum { int, float, is_float } => {
                if let Some(Value::Number(n)) = value {
                    match n.as_i64() {
                        Some(i) if !*is_float => match int.checked_add(i) {
                            Some(sum) => *int = sum,
                            None => {
                                *float = *int as f64 + i as f64;
                                *is_float = true;
                            }
                        },
                        _ => {
                            if !*is_float {
                                *float = *int as f64;
                                *is_float = true;
                            }
                            *float += n.as_f64().unwrap_or(0.0);
                        }
                    }
                }
            }
            Self::Avg { total, count } => {
                if let Some(n) = value.as_ref().and_then(Value::as_f64) {
                    *total += n;
                    *count += 1;
                }
            }
            Self::Min(current) => fold_extreme(current, value, Ordering::Less),
            Self::Max(current) => fold_extreme(current, value, Ordering::Greater),
            Self::Count(n) => *n += 1,
            Self::Push(items) => {
                if let Some(v) = value {
                    items.push(v);
                }
            }
            Self::AddToSet(items) => {
                if let Some(v) = value {
                    if !items.iter().any(|existing| values_equal(existing, &v)) {
                        items.push(v);
                    }
                }
            }
            Self::First(first) => {
                if first.is_none() {
                    *first = Some(value);
                }
            }
            Self::Last(last) => *last = value.or(Some(Value::Null)),
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Sum { int, float, is_float } => {
                if is_float {
                    Value::from(float)
                } else {
                    Value::from(int)
                }
            }
            Self::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::from(total / count as f64)
                }
            }
            Self::Min(v) | Self::Max(v) => v.unwrap_or(Value::Null),
            Self::Count(n) => Value::from(n),
            Self::Push(items) | Self::AddToSet(items) => Value::Array(items),
            Self::First(v) => v.flatten().unwrap_or(Value::Null),
            Self::Last(v) => v.unwrap_or(Value::Null),
        }
    }
}

/// Keeps `value` if it orders `wanted` relative to the current extreme.
/// Missing and null values are ignored.
fn fold_extreme(current: &mut Option<Value>, value: Option<Value>, wanted: Ordering) {
    let value = match value {
        Some(v) if !v.is_null() => v,
        _ => return,
    };
    let replace = match current.as_ref() {
        None => true,
        Some(c) => compare_values(Some(&value), Some(c)) == wanted,
    };
    if replace {
        *current = Some(value);
    }
}

fn group(docs: &[Map<String, Value>], spec: &Map<String, Value>) -> StoreResult<Vec<Map<String, Value>>> {
    let key_expr = spec
        .get(ID_FIELD)
        .ok_or_else(|| StoreError::InvalidQuery("$group requires an _id expression".into()))?;

    let template = spec
        .iter()
        .filter(|(field, _)| field.as_str() != ID_FIELD)
        .map(|(field, acc)| {
            let (acc, expr) = Accumulator::parse(field, acc)?;
            Ok((field.clone(), acc, expr))
        })
        .collect::<StoreResult<Vec<_>>>()?;

    let mut order: Vec<(Value, Vec<Accumulator>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for doc in docs {
        let key = evaluate(doc, key_expr).unwrap_or(Value::Null);
        let fingerprint = key.to_string();
        let slot = match index.get(&fingerprint) {
            Some(&slot) => slot,
            None => {
                order.push((key, template.iter().map(|(_, acc, _)| acc.clone()).collect()));
                index.insert(fingerprint, order.len() - 1);
                order.len() - 1
            }
        };
        for ((_, _, expr), acc) in template.iter().zip(order[slot].1.iter_mut()) {
            acc.fold(evaluate(doc, expr));
        }
    }

    Ok(order
        .into_iter()
        .map(|(key, accs)| {
            let mut out = Map::new();
            out.insert(ID_FIELD.to_string(), key);
            for ((field, _, _), acc) in template.iter().zip(accs) {
                out.insert(field.clone(), acc.finish());
            }
            out
        })
        .collect())
}

fn unwind(docs: Vec<Map<String, Value>>, spec: &Unwind) -> Vec<Map<String, Value>> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match path::get(&doc, &spec.path).cloned() {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = doc.clone();
                    path::set(&mut copy, &spec.path, item);
                    out.push(copy);
                }
            }
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                if spec.preserve_null_and_empty {
                    let mut copy = doc;
                    path::remove(&mut copy, &spec.path);
                    out.push(copy);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    out
}

fn lookup(
    docs: Vec<Map<String, Value>>,
    spec: &Lookup,
    foreign: &[Map<String, Value>],
) -> Vec<Map<String, Value>> {
    docs.into_iter()
        .map(|mut doc| {
            let local = path::get(&doc, &spec.local_field).cloned().unwrap_or(Value::Null);
            let joined: Vec<Value> = foreign
                .iter()
                .filter(|f| {
                    let theirs = path::get(f, &spec.foreign_field);
                    match &local {
                        Value::Array(items) => items.iter().any(|item| eq_match(theirs, item)),
                        single => eq_match(theirs, single),
                    }
                })
                .map(|f| Value::Object(f.clone()))
                .collect();
            path::set(&mut doc, &spec.as_field, Value::Array(joined));
            doc
        })
        .collect()
}

//! Filter evaluation for the in-memory store
//!
//! Matches documents against filter objects. Supported operators:
//! `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex $not` on fields
//! and `$and $or $nor` at clause level. Anything else is an invalid
//! query, never a silent match.
//!
//! Ordering comparisons only hold between values of the same type;
//! there is no coercion between strings and numbers.

use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::errors::{StoreError, StoreResult};
use super::path;
use super::sorter::compare_values;

/// Evaluates filters against documents
pub struct FilterMatcher;

impl FilterMatcher {
    /// Checks if a document matches every clause of the filter.
    ///
    /// An empty filter matches everything.
    pub fn matches(doc: &Map<String, Value>, filter: &Map<String, Value>) -> StoreResult<bool> {
        for (key, condition) in filter {
            if !Self::matches_clause(doc, key, condition)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matches_clause(doc: &Map<String, Value>, key: &str, condition: &Value) -> StoreResult<bool> {
        match key {
            "$and" => {
                for clause in Self::clauses(key, condition)? {
                    if !Self::matches(doc, clause)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            "$or" => {
                for clause in Self::clauses(key, condition)? {
                    if Self::matches(doc, clause)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            "$nor" => {
                for clause in Self::clauses(key, condition)? {
                    if Self::matches(doc, clause)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            op if op.starts_with('$') => Err(StoreError::InvalidQuery(format!(
                "unsupported top-level operator {}",
                op
            ))),
            field => Self::matches_field(path::get(doc, field), condition),
        }
    }

    fn clauses<'a>(op: &str, condition: &'a Value) -> StoreResult<Vec<&'a Map<String, Value>>> {
        let items = condition
            .as_array()
            .ok_or_else(|| StoreError::InvalidQuery(format!("{} requires an array", op)))?;
        items
            .iter()
            .map(|item| {
                item.as_object()
                    .ok_or_else(|| StoreError::InvalidQuery(format!("{} clauses must be objects", op)))
            })
            .collect()
    }

    fn matches_field(actual: Option<&Value>, condition: &Value) -> StoreResult<bool> {
        match condition {
            Value::Object(ops) if is_operator_object(ops) => {
                for (op, operand) in ops {
                    if op == "$options" {
                        continue;
                    }
                    if !Self::matches_operator(actual, op, operand, ops)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            expected => Ok(eq_match(actual, expected)),
        }
    }

    fn matches_operator(
        actual: Option<&Value>,
        op: &str,
        operand: &Value,
        siblings: &Map<String, Value>,
    ) -> StoreResult<bool> {
        match op {
            "$eq" => Ok(eq_match(actual, operand)),
            "$ne" => Ok(!eq_match(actual, operand)),
            "$gt" => Ok(range_match(actual, operand, |o| o == Ordering::Greater)),
            "$gte" => Ok(range_match(actual, operand, |o| o != Ordering::Less)),
            "$lt" => Ok(range_match(actual, operand, |o| o == Ordering::Less)),
            "$lte" => Ok(range_match(actual, operand, |o| o != Ordering::Greater)),
            "$in" => {
                let candidates = operand
                    .as_array()
                    .ok_or_else(|| StoreError::InvalidQuery("$in requires an array".into()))?;
                Ok(candidates.iter().any(|c| eq_match(actual, c)))
            }
            "$nin" => {
                let candidates = operand
                    .as_array()
                    .ok_or_else(|| StoreError::InvalidQuery("$nin requires an array".into()))?;
                Ok(!candidates.iter().any(|c| eq_match(actual, c)))
            }
            "$exists" => {
                let wanted = operand.as_bool().unwrap_or_else(|| operand.as_i64() != Some(0));
                Ok(actual.is_some() == wanted)
            }
            "$regex" => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| StoreError::InvalidQuery("$regex requires a string".into()))?;
                let options = siblings.get("$options").and_then(Value::as_str).unwrap_or("");
                regex_match(actual, pattern, options)
            }
            "$not" => match operand {
                Value::Object(ops) if is_operator_object(ops) => {
                    Ok(!Self::matches_field(actual, operand)?)
                }
                Value::String(pattern) => Ok(!regex_match(actual, pattern, "")?),
                _ => Err(StoreError::InvalidQuery(
                    "$not requires an operator object or a pattern".into(),
                )),
            },
            other => Err(StoreError::InvalidQuery(format!(
                "unsupported operator {}",
                other
            ))),
        }
    }
}

/// Equality with number normalization, `null` matching missing fields,
/// and array fields matching on any element.
pub(crate) fn eq_match(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(value) => {
            if values_equal(value, expected) {
                return true;
            }
            match value {
                Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
                _ => false,
            }
        }
    }
}

/// Structural equality where `1` and `1.0` are equal
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn range_match(actual: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let comparable = |value: &Value| match (value, bound) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            accept(compare_values(Some(value), Some(bound)))
        }
        _ => false,
    };

    match actual {
        None => false,
        Some(Value::Array(items)) => items.iter().any(comparable),
        Some(value) => comparable(value),
    }
}

fn regex_match(actual: Option<&Value>, pattern: &str, options: &str) -> StoreResult<bool> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .build()
        .map_err(|e| StoreError::InvalidQuery(format!("invalid $regex: {}", e)))?;

    Ok(match actual {
        Some(Value::String(s)) => re.is_match(s),
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| item.as_str().is_some_and(|s| re.is_match(s))),
        _ => false,
    })
}

fn is_operator_object(obj: &Map<String, Value>) -> bool {
    !obj.is_empty() && obj.keys().all(|k| k.starts_with('$'))
}

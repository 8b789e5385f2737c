//! Update operator application
//!
//! Supported operators: `$set $unset $inc $push $pull $addToSet`.
//! `$push` and `$addToSet` accept `{"$each": [...]}`. The identity
//! field can never be modified.

use serde_json::{Map, Value};

use super::errors::{StoreError, StoreResult};
use super::filter::{values_equal, FilterMatcher};
use super::path;
use crate::schema::ID_FIELD;

/// Applies update documents to stored documents
pub struct UpdateApplier;

impl UpdateApplier {
    /// Validates an update document without applying it.
    pub fn validate(update: &Map<String, Value>) -> StoreResult<()> {
        if update.is_empty() {
            return Err(StoreError::InvalidUpdate("update document is empty".into()));
        }
        for (op, fields) in update {
            if !matches!(
                op.as_str(),
                "$set" | "$unset" | "$inc" | "$push" | "$pull" | "$addToSet"
            ) {
                return Err(StoreError::InvalidUpdate(format!(
                    "unsupported update operator '{}'",
                    op
                )));
            }
            let fields = fields.as_object().ok_or_else(|| {
                StoreError::InvalidUpdate(format!("{} requires an object", op))
            })?;
            if fields.keys().any(|f| f == ID_FIELD || f.starts_with("_id.")) {
                return Err(StoreError::InvalidUpdate(format!(
                    "{} may not modify {}",
                    op, ID_FIELD
                )));
            }
        }
        Ok(())
    }

    /// Applies an update in place.
    ///
    /// Returns true if the document changed.
    pub fn apply(doc: &mut Map<String, Value>, update: &Map<String, Value>) -> StoreResult<bool> {
        Self::validate(update)?;
        let before = doc.clone();

        for (op, fields) in update {
            let fields = match fields.as_object() {
                Some(fields) => fields,
                None => continue,
            };
            for (field, value) in fields {
                match op.as_str() {
                    "$set" => set(doc, field, value.clone())?,
                    "$unset" => {
                        path::remove(doc, field);
                    }
                    "$inc" => inc(doc, field, value)?,
                    "$push" => push(doc, field, value, false)?,
                    "$addToSet" => push(doc, field, value, true)?,
                    "$pull" => pull(doc, field, value)?,
                    other => {
                        return Err(StoreError::InvalidUpdate(format!(
                            "unsupported update operator '{}'",
                            other
                        )))
                    }
                }
            }
        }

        Ok(!values_equal(&Value::Object(before), &Value::Object(doc.clone())))
    }
}

fn set(doc: &mut Map<String, Value>, field: &str, value: Value) -> StoreResult<()> {
    if path::set(doc, field, value) {
        Ok(())
    } else {
        Err(StoreError::InvalidUpdate(format!(
            "cannot create field '{}' inside a non-object",
            field
        )))
    }
}

fn inc(doc: &mut Map<String, Value>, field: &str, by: &Value) -> StoreResult<()> {
    if !by.is_number() {
        return Err(StoreError::InvalidUpdate(format!(
            "$inc amount for '{}' must be a number",
            field
        )));
    }

    let next = match path::get(doc, field) {
        None | Some(Value::Null) => by.clone(),
        Some(current) => match (current.as_i64(), by.as_i64()) {
            (Some(a), Some(b)) => a.checked_add(b).map(Value::from).ok_or_else(|| {
                StoreError::InvalidUpdate(format!("$inc on '{}' overflows", field))
            })?,
            _ => match (current.as_f64(), by.as_f64()) {
                (Some(a), Some(b)) => Value::from(a + b),
                _ => {
                    return Err(StoreError::InvalidUpdate(format!(
                        "$inc target '{}' is not a number",
                        field
                    )))
                }
            },
        },
    };
    set(doc, field, next)
}

fn push(doc: &mut Map<String, Value>, field: &str, value: &Value, unique: bool) -> StoreResult<()> {
    let items = match value {
        Value::Object(modifiers) if modifiers.contains_key("$each") => match &modifiers["$each"] {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        },
        other => vec![other.clone()],
    };

    let mut array = match path::get(doc, field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(existing)) => existing.clone(),
        Some(_) => {
            return Err(StoreError::InvalidUpdate(format!(
                "'{}' is not an array",
                field
            )))
        }
    };

    for item in items {
        if unique && array.iter().any(|existing| values_equal(existing, &item)) {
            continue;
        }
        array.push(item);
    }
    set(doc, field, Value::Array(array))
}

fn pull(doc: &mut Map<String, Value>, field: &str, condition: &Value) -> StoreResult<()> {
    let existing = match path::get(doc, field) {
        Some(Value::Array(items)) => items.clone(),
        _ => return Ok(()),
    };

    let mut kept = Vec::with_capacity(existing.len());
    for item in existing {
        let matched = match condition {
            Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                let mut probe = Map::new();
                probe.insert("v".into(), item.clone());
                let mut filter = Map::new();
                filter.insert("v".into(), condition.clone());
                FilterMatcher::matches(&probe, &filter)
                    .map_err(|e| StoreError::InvalidUpdate(e.to_string()))?
            }
            _ => values_equal(&item, condition),
        };
        if !matched {
            kept.push(item);
        }
    }
    set(doc, field, Value::Array(kept))
}

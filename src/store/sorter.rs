//! Document sorting
//!
//! Sorts on one or more keys, each ascending (`1`) or descending (`-1`).
//! Sorting is stable, so equal keys keep insertion order.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::errors::{StoreError, StoreResult};
use super::path;

/// Sort direction for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Parsed sort specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub keys: Vec<(String, SortDirection)>,
}

impl SortSpec {
    /// Parses `{"field": 1, "other": -1}`.
    pub fn parse(raw: &Map<String, Value>) -> StoreResult<Self> {
        let keys = raw
            .iter()
            .map(|(field, dir)| {
                let direction = match dir.as_i64() {
                    Some(1) => SortDirection::Asc,
                    Some(-1) => SortDirection::Desc,
                    _ => {
                        return Err(StoreError::InvalidQuery(format!(
                            "sort direction for '{}' must be 1 or -1",
                            field
                        )))
                    }
                };
                Ok((field.clone(), direction))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Self { keys })
    }
}

/// Sorts documents
pub struct DocumentSorter;

impl DocumentSorter {
    pub fn sort(documents: &mut [Map<String, Value>], spec: &SortSpec) {
        documents.sort_by(|a, b| {
            for (field, direction) in &spec.keys {
                let ordering = compare_values(path::get(a, field), path::get(b, field));
                let ordering = match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
}

/// Compares two JSON values.
///
/// Ordering rules:
/// - missing < null < bool < number < string < array < object
/// - same types use natural ordering; arrays and objects compare equal
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(a), Some(b)) => (a, b),
    };

    let type_order = |v: &Value| -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    };

    let by_type = type_order(a).cmp(&type_order(b));
    if by_type != Ordering::Equal {
        return by_type;
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, score: Value) -> Map<String, Value> {
        json!({"id": id, "score": score}).as_object().cloned().unwrap()
    }

    fn ids(docs: &[Map<String, Value>]) -> Vec<&str> {
        docs.iter().map(|d| d["id"].as_str().unwrap()).collect()
    }

    fn spec(raw: Value) -> SortSpec {
        SortSpec::parse(raw.as_object().unwrap()).unwrap()
    }

    #[test]
    fn test_sort_ascending_and_descending() {
        let mut docs = vec![doc("c", json!(3)), doc("a", json!(1)), doc("b", json!(2))];

        DocumentSorter::sort(&mut docs, &spec(json!({"score": 1})));
        assert_eq!(ids(&docs), vec!["a", "b", "c"]);

        DocumentSorter::sort(&mut docs, &spec(json!({"score": -1})));
        assert_eq!(ids(&docs), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_sort_stable() {
        let mut docs = vec![doc("a", json!(5)), doc("b", json!(5)), doc("c", json!(5))];
        DocumentSorter::sort(&mut docs, &spec(json!({"score": 1})));
        assert_eq!(ids(&docs), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_sorts_first() {
        let mut docs = vec![doc("a", json!(1)), json!({"id": "z"}).as_object().cloned().unwrap()];
        DocumentSorter::sort(&mut docs, &spec(json!({"score": 1})));
        assert_eq!(ids(&docs), vec!["z", "a"]);
    }

    #[test]
    fn test_invalid_direction() {
        let err = SortSpec::parse(json!({"score": "up"}).as_object().unwrap()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }
}

//! Read results

use serde::Serialize;
use serde_json::Value;

/// Documents returned by a read plan
///
/// Single plans return one list; step sequences return one list per
/// step, in step order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadOutput {
    Single(Vec<Value>),
    Sequence(Vec<Vec<Value>>),
}

impl ReadOutput {
    /// Total number of documents across all lists
    pub fn len(&self) -> usize {
        match self {
            Self::Single(docs) => docs.len(),
            Self::Sequence(lists) => lists.iter().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Single(docs) => Value::Array(docs.clone()),
            Self::Sequence(lists) => {
                Value::Array(lists.iter().cloned().map(Value::Array).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sequence_shape() {
        let out = ReadOutput::Sequence(vec![vec![json!({"a": 1})], vec![]]);
        assert_eq!(out.to_value(), json!([[{"a": 1}], []]));
        assert_eq!(out.len(), 1);
        assert_eq!(serde_json::to_value(&out).unwrap(), out.to_value());
    }
}

//! Pending operations
//!
//! A write plan that is missing required fields, or is waiting for
//! confirmation, parked under a conversation id until a later turn
//! completes it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::plan::{DeleteOp, InsertData, InsertOp, UpdateOp, WriteAction, WriteOp};
use crate::schema::CollectionSchema;

/// Operation body carried between turns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PendingPayload {
    Insert {
        documents: Vec<Map<String, Value>>,
    },
    Update {
        filter: Map<String, Value>,
        update: Map<String, Value>,
    },
    Delete {
        filter: Map<String, Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub action: WriteAction,
    /// Normalized collection name
    pub collection: String,
    pub payload: PendingPayload,
    #[serde(default)]
    pub options: Map<String, Value>,
    pub required_fields: Vec<String>,
    /// Values gathered so far, newest wins
    pub filled: Map<String, Value>,
    /// Required fields without a non-empty value in `filled`
    pub missing_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub touched_at: DateTime<Utc>,
}

impl PendingOperation {
    /// Builds a pending operation from a write plan.
    ///
    /// Required fields already present in the plan (insert data, or the
    /// update's `$set` and plain assignments) start out filled. Returns
    /// `None` for the no-op action.
    pub fn from_write(op: &WriteOp, schema: &CollectionSchema) -> Option<Self> {
        let action = op.action();
        let kind = action.kind()?;

        let (payload, options, present) = match op {
            WriteOp::InsertOne(insert) | WriteOp::InsertMany(insert) => {
                let documents = insert
                    .data
                    .clone()
                    .map(InsertData::into_documents)
                    .unwrap_or_default();
                let present = match documents.as_slice() {
                    [single] => single.clone(),
                    _ => Map::new(),
                };
                (PendingPayload::Insert { documents }, &insert.options, present)
            }
            WriteOp::UpdateOne(update) | WriteOp::UpdateMany(update) => {
                let body = update.update.clone().unwrap_or_default();
                let mut present: Map<String, Value> = body
                    .iter()
                    .filter(|(key, _)| !key.starts_with('$'))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if let Some(Value::Object(set)) = body.get("$set") {
                    present.extend(set.clone());
                }
                let payload = PendingPayload::Update {
                    filter: update.filter.clone().unwrap_or_default(),
                    update: body,
                };
                (payload, &update.options, present)
            }
            WriteOp::DeleteOne(delete) | WriteOp::DeleteMany(delete) => {
                let payload = PendingPayload::Delete {
                    filter: delete.filter.clone().unwrap_or_default(),
                };
                (payload, &delete.options, Map::new())
            }
            WriteOp::None => return None,
        };

        let required_fields = schema.required_for(kind).to_vec();
        let filled: Map<String, Value> = present
            .iter()
            .map(|(key, value)| (schema.resolve(key).to_string(), value.clone()))
            .filter(|(field, value)| required_fields.contains(field) && has_value(value))
            .collect();

        let now = Utc::now();
        let mut pending = Self {
            action,
            collection: schema.name.clone(),
            payload,
            options: options.clone(),
            required_fields,
            filled,
            missing_fields: Vec::new(),
            natural_summary: None,
            created_at: now,
            touched_at: now,
        };
        pending.recompute_missing();
        Some(pending)
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.natural_summary = Some(summary.into());
        self
    }

    /// Overlays new field values and folds them into the payload.
    ///
    /// Insert documents receive the fields directly; updates receive
    /// them in `$set`. Delete payloads are left as they are.
    pub fn merge(&mut self, fields: &Map<String, Value>) {
        for (key, value) in fields {
            self.filled.insert(key.clone(), value.clone());
        }

        match &mut self.payload {
            PendingPayload::Insert { documents } => {
                if documents.is_empty() {
                    documents.push(Map::new());
                }
                for doc in documents.iter_mut() {
                    doc.extend(self.filled.clone());
                }
            }
            PendingPayload::Update { update, .. } => {
                let set = update
                    .entry("$set")
                    .or_insert_with(|| Value::Object(Map::new()));
                match set {
                    Value::Object(set) => set.extend(self.filled.clone()),
                    other => *other = Value::Object(self.filled.clone()),
                }
            }
            PendingPayload::Delete { .. } => {}
        }

        self.recompute_missing();
        self.touched_at = Utc::now();
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields.is_empty()
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.touched_at > ttl
    }

    /// The write plan this operation will execute once complete
    pub fn to_write_op(&self) -> WriteOp {
        let collection = Some(self.collection.clone());
        let options = self.options.clone();
        match &self.payload {
            PendingPayload::Insert { documents } => {
                let data = match (self.action, documents.as_slice()) {
                    (WriteAction::InsertOne, [doc]) => InsertData::One(doc.clone()),
                    _ => InsertData::Many(documents.clone()),
                };
                let op = InsertOp {
                    collection,
                    data: Some(data),
                    options,
                };
                if self.action == WriteAction::InsertOne {
                    WriteOp::InsertOne(op)
                } else {
                    WriteOp::InsertMany(op)
                }
            }
            PendingPayload::Update { filter, update } => {
                let op = UpdateOp {
                    collection,
                    filter: Some(filter.clone()),
                    update: Some(update.clone()),
                    options,
                };
                if self.action == WriteAction::UpdateOne {
                    WriteOp::UpdateOne(op)
                } else {
                    WriteOp::UpdateMany(op)
                }
            }
            PendingPayload::Delete { filter } => {
                let op = DeleteOp {
                    collection,
                    filter: Some(filter.clone()),
                    options,
                };
                if self.action == WriteAction::DeleteOne {
                    WriteOp::DeleteOne(op)
                } else {
                    WriteOp::DeleteMany(op)
                }
            }
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn recompute_missing(&mut self) {
        self.missing_fields = self
            .required_fields
            .iter()
            .filter(|field| !self.filled.get(field.as_str()).is_some_and(has_value))
            .cloned()
            .collect();
    }
}

/// Null and the empty string count as absent
fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn vendor_insert(data: Value) -> PendingOperation {
        let registry = SchemaRegistry::builtin();
        let schema = registry.resolve("vendors").unwrap();
        let op: WriteOp = serde_json::from_value(json!({
            "action": "insertOne", "collection": "vendors", "data": data
        }))
        .unwrap();
        PendingOperation::from_write(&op, schema).unwrap()
    }

    #[test]
    fn test_initial_missing_fields() {
        let pending = vendor_insert(json!({"name": "Acme", "tipo": "Material"}));
        assert_eq!(pending.missing_fields, vec!["main_mail", "mobile"]);
        assert_eq!(pending.filled, obj(json!({"name": "Acme", "class": "Material"})));
        assert!(!pending.is_complete());
    }

    #[test]
    fn test_merge_accumulates_and_last_wins() {
        let mut pending = vendor_insert(json!({}));

        pending.merge(&obj(json!({"a": 1})));
        pending.merge(&obj(json!({"b": 2})));
        assert_eq!(pending.filled, obj(json!({"a": 1, "b": 2})));

        pending.merge(&obj(json!({"a": 3})));
        assert_eq!(pending.filled["a"], 3);
    }

    #[test]
    fn test_empty_values_stay_missing() {
        let mut pending = vendor_insert(json!({"name": "Acme", "class": "Material"}));
        pending.merge(&obj(json!({"main_mail": "", "mobile": null})));
        assert_eq!(pending.missing_fields, vec!["main_mail", "mobile"]);

        pending.merge(&obj(json!({"main_mail": "a@acme.com", "mobile": "555"})));
        assert!(pending.is_complete());
    }

    #[test]
    fn test_merge_folds_into_insert_data() {
        let mut pending = vendor_insert(json!({"name": "Acme"}));
        pending.merge(&obj(json!({"mobile": "555"})));

        match pending.to_write_op() {
            WriteOp::InsertOne(op) => match op.data {
                Some(InsertData::One(doc)) => assert_eq!(doc["mobile"], "555"),
                other => panic!("unexpected data: {:?}", other),
            },
            other => panic!("unexpected op: {:?}", other),
        }
    }

    #[test]
    fn test_merge_folds_into_set() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.resolve("projects").unwrap();
        let op: WriteOp = serde_json::from_value(json!({
            "action": "updateOne", "collection": "projects",
            "filter": {"id": "P1"}, "update": {"$inc": {"x": 1}}
        }))
        .unwrap();

        let mut pending = PendingOperation::from_write(&op, schema).unwrap();
        pending.merge(&obj(json!({"name": "Plant"})));

        match &pending.payload {
            PendingPayload::Update { update, .. } => {
                assert_eq!(Value::Object(update.clone()), json!({"$inc": {"x": 1}, "$set": {"name": "Plant"}}));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_expiry() {
        let pending = vendor_insert(json!({}));
        let later = pending.touched_at + Duration::minutes(31);
        assert!(pending.is_expired(later, Duration::minutes(30)));
        assert!(!pending.is_expired(pending.touched_at, Duration::minutes(30)));
    }
}

//! Operation plan model
//!
//! Plans are closed tagged variants. A plan's shape is decided once, by
//! its `mode` (reads) or `action` (writes) discriminant, and everything
//! downstream pattern-matches on the variant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::errors::{PlanError, PlanResult};
use crate::schema::WriteKind;

/// Top-level plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OperationPlan {
    Find(FindStep),
    Aggregate(AggregateStep),
    Steps { steps: Vec<ReadStep> },
    Write { operation: WriteOp },
}

/// One step of a read sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReadStep {
    Find(FindStep),
    Aggregate(AggregateStep),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindStep {
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStep {
    pub collection: String,
    /// Raw stages, validated by the read executor
    #[serde(default)]
    pub pipeline: Vec<Value>,
}

/// A mutation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum WriteOp {
    InsertOne(InsertOp),
    InsertMany(InsertOp),
    UpdateOne(UpdateOp),
    UpdateMany(UpdateOp),
    DeleteOne(DeleteOp),
    DeleteMany(DeleteOp),
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertOp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<InsertData>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateOp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteOp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

/// Insert payload: one document or a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsertData {
    Many(Vec<Map<String, Value>>),
    One(Map<String, Value>),
}

impl InsertData {
    pub fn into_documents(self) -> Vec<Map<String, Value>> {
        match self {
            Self::Many(docs) => docs,
            Self::One(doc) => vec![doc],
        }
    }
}

/// Write discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteAction {
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
    None,
}

impl WriteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsertOne => "insertOne",
            Self::InsertMany => "insertMany",
            Self::UpdateOne => "updateOne",
            Self::UpdateMany => "updateMany",
            Self::DeleteOne => "deleteOne",
            Self::DeleteMany => "deleteMany",
            Self::None => "none",
        }
    }

    /// Write family, or `None` for the no-op action
    pub fn kind(&self) -> Option<WriteKind> {
        match self {
            Self::InsertOne | Self::InsertMany => Some(WriteKind::Insert),
            Self::UpdateOne | Self::UpdateMany => Some(WriteKind::Update),
            Self::DeleteOne | Self::DeleteMany => Some(WriteKind::Delete),
            Self::None => None,
        }
    }

    /// True for the unscoped-capable bulk mutations
    pub fn is_bulk_mutation(&self) -> bool {
        matches!(self, Self::UpdateMany | Self::DeleteMany)
    }

    /// True for mutations that target a single existing document
    pub fn is_single_mutation(&self) -> bool {
        matches!(self, Self::UpdateOne | Self::DeleteOne)
    }
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WriteOp {
    pub fn action(&self) -> WriteAction {
        match self {
            Self::InsertOne(_) => WriteAction::InsertOne,
            Self::InsertMany(_) => WriteAction::InsertMany,
            Self::UpdateOne(_) => WriteAction::UpdateOne,
            Self::UpdateMany(_) => WriteAction::UpdateMany,
            Self::DeleteOne(_) => WriteAction::DeleteOne,
            Self::DeleteMany(_) => WriteAction::DeleteMany,
            Self::None => WriteAction::None,
        }
    }

    /// Raw target collection, if any
    pub fn collection(&self) -> Option<&str> {
        match self {
            Self::InsertOne(op) | Self::InsertMany(op) => op.collection.as_deref(),
            Self::UpdateOne(op) | Self::UpdateMany(op) => op.collection.as_deref(),
            Self::DeleteOne(op) | Self::DeleteMany(op) => op.collection.as_deref(),
            Self::None => None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl OperationPlan {
    /// Parses an untrusted plan.
    ///
    /// A bare `{"steps": [...]}` object without a mode is accepted as a
    /// step sequence. Step errors carry the failing step's position.
    pub fn from_value(raw: &Value) -> PlanResult<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| PlanError::InvalidPlan("plan must be a JSON object".into()))?;

        let mode = obj.get("mode").and_then(Value::as_str);
        let is_sequence = match mode {
            Some("steps") => true,
            None => obj.contains_key("steps"),
            Some(_) => false,
        };

        if !is_sequence {
            return serde_json::from_value(raw.clone())
                .map_err(|e| PlanError::InvalidPlan(e.to_string()));
        }

        let items = obj
            .get("steps")
            .and_then(Value::as_array)
            .ok_or_else(|| PlanError::InvalidPlan("'steps' must be an array".into()))?;

        let steps = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value::<ReadStep>(item.clone()).map_err(|e| {
                    PlanError::InvalidStep {
                        index,
                        reason: e.to_string(),
                    }
                })
            })
            .collect::<PlanResult<Vec<_>>>()?;

        Ok(Self::Steps { steps })
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Find(_) => "find",
            Self::Aggregate(_) => "aggregate",
            Self::Steps { .. } => "steps",
            Self::Write { .. } => "write",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_find() {
        let plan = OperationPlan::from_value(&json!({
            "mode": "find",
            "collection": "vendors",
            "filter": {"status": "Activo"},
            "limit": 10
        }))
        .unwrap();

        match plan {
            OperationPlan::Find(step) => {
                assert_eq!(step.collection, "vendors");
                assert_eq!(step.limit, Some(10));
                assert!(step.skip.is_none());
            }
            other => panic!("unexpected plan: {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_steps() {
        let plan = OperationPlan::from_value(&json!({
            "steps": [
                {"mode": "find", "collection": "vendors"},
                {"mode": "aggregate", "collection": "quotes", "pipeline": [{"$limit": 1}]}
            ]
        }))
        .unwrap();

        match plan {
            OperationPlan::Steps { steps } => {
                assert_eq!(steps.len(), 2);
                assert!(matches!(steps[1], ReadStep::Aggregate(_)));
            }
            other => panic!("unexpected plan: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_step_reports_index() {
        let err = OperationPlan::from_value(&json!({
            "mode": "steps",
            "steps": [
                {"mode": "find", "collection": "vendors"},
                {"mode": "drop", "collection": "vendors"}
            ]
        }))
        .unwrap_err();

        assert!(matches!(err, PlanError::InvalidStep { index: 1, .. }));
    }

    #[test]
    fn test_parse_write_envelope() {
        let plan = OperationPlan::from_value(&json!({
            "mode": "write",
            "operation": {
                "action": "updateOne",
                "collection": "quoterequestlines",
                "filter": {"id": "L1"},
                "update": {"$set": {"status": "waiting"}}
            }
        }))
        .unwrap();

        match plan {
            OperationPlan::Write { operation } => {
                assert_eq!(operation.action(), WriteAction::UpdateOne);
                assert_eq!(operation.collection(), Some("quoterequestlines"));
            }
            other => panic!("unexpected plan: {:?}", other),
        }
    }

    #[test]
    fn test_write_none_and_missing_collection() {
        let none: WriteOp = serde_json::from_value(json!({"action": "none", "note": "x"})).unwrap();
        assert_eq!(none, WriteOp::None);

        let op: WriteOp = serde_json::from_value(json!({"action": "deleteMany"})).unwrap();
        assert_eq!(op.collection(), None);
    }

    #[test]
    fn test_insert_data_one_or_many() {
        let one: WriteOp = serde_json::from_value(json!({
            "action": "insertOne", "collection": "projects", "data": {"name": "A"}
        }))
        .unwrap();
        let many: WriteOp = serde_json::from_value(json!({
            "action": "insertMany", "collection": "projects",
            "data": [{"name": "A"}, {"name": "B"}]
        }))
        .unwrap();

        match (one, many) {
            (WriteOp::InsertOne(a), WriteOp::InsertMany(b)) => {
                assert_eq!(a.data.unwrap().into_documents().len(), 1);
                assert_eq!(b.data.unwrap().into_documents().len(), 2);
            }
            other => panic!("unexpected ops: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_rejected() {
        let err = OperationPlan::from_value(&json!({
            "mode": "write",
            "operation": {"action": "dropCollection", "collection": "vendors"}
        }))
        .unwrap_err();
        assert_eq!(err.code(), "OPG_PLAN_INVALID");
    }

    #[test]
    fn test_action_families() {
        assert!(WriteAction::DeleteMany.is_bulk_mutation());
        assert!(WriteAction::UpdateOne.is_single_mutation());
        assert_eq!(WriteAction::InsertMany.kind(), Some(WriteKind::Insert));
        assert_eq!(WriteAction::None.kind(), None);
    }
}

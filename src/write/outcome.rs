//! Write outcomes and their caller-facing JSON shapes

use serde_json::{json, Value};
use uuid::Uuid;

use crate::plan::WriteAction;
use crate::store::RawOutcome;

/// Per-call write options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Return the sanitized plan without executing it
    pub dry_run: bool,
    /// Turn unscoped bulk mutations into a confirmation request
    pub require_confirm: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            require_confirm: true,
        }
    }
}

impl WriteOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    /// Executes unscoped bulk mutations without asking.
    pub fn forced() -> Self {
        Self {
            require_confirm: false,
            ..Self::default()
        }
    }
}

/// Terminal state of one write call
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// `none` action; nothing ran
    NoOp,
    /// Bulk mutation with an empty filter; store untouched
    ConfirmRequired { reason: String, plan: Value },
    DryRun { plan: Value },
    Executed(ExecutedWrite),
}

/// A committed mutation
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedWrite {
    pub action: WriteAction,
    pub collection: String,
    pub affected: usize,
    /// Stored documents (inserts only)
    pub inserted: Option<Vec<Value>>,
    /// Matched documents before the mutation (updates and deletes)
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub raw: RawOutcome,
    pub audit_id: Uuid,
}

impl WriteOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed(_))
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::NoOp => json!({"ok": true, "action": WriteAction::None.as_str()}),
            Self::ConfirmRequired { reason, plan } => json!({
                "ok": false,
                "confirmRequired": true,
                "reason": reason,
                "plan": plan,
            }),
            Self::DryRun { plan } => json!({"ok": true, "dryRun": true, "plan": plan}),
            Self::Executed(write) => write.to_value(),
        }
    }
}

impl ExecutedWrite {
    pub fn to_value(&self) -> Value {
        let mut out = json!({
            "ok": true,
            "action": self.action.as_str(),
            "collection": self.collection,
            "affected": self.affected,
            "raw": self.raw.to_value(),
            "auditId": self.audit_id.to_string(),
        });
        if let Value::Object(map) = &mut out {
            match &self.inserted {
                Some(docs) => {
                    map.insert("inserted".into(), Value::Array(docs.clone()));
                }
                None => {
                    map.insert("before".into(), self.before.clone().unwrap_or(Value::Null));
                    map.insert("after".into(), self.after.clone().unwrap_or(Value::Null));
                }
            }
        }
        out
    }
}

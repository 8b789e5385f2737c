//! Inbound turns and replies

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::conversation::PendingOperation;
use crate::executor::ReadOutput;
use crate::plan::WriteAction;
use crate::write::WriteOutcome;

/// One inbound request
///
/// Either `plan` is set, or `text` is handed to the plan producer. A
/// conversation id ties the turn to a pending operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    /// Originating request text, recorded in the audit trail
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Structured values for a pending operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
    #[serde(default)]
    pub confirm: bool,
    #[serde(default)]
    pub dry_run: bool,
    /// Skip the bulk-mutation guard
    #[serde(default)]
    pub force: bool,
    /// Abandon the conversation's pending operation
    #[serde(default)]
    pub cancel: bool,
}

impl Turn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn plan(plan: Value) -> Self {
        Self {
            plan: Some(plan),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn in_conversation(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.confirm = true;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn cancelled(mut self) -> Self {
        self.cancel = true;
        self
    }
}

/// What the engine did with a turn
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Read(ReadOutput),
    Write(WriteOutcome),
    /// Required fields are still missing; nothing executed
    MissingFields {
        collection: String,
        action: WriteAction,
        missing: Vec<String>,
        required: Vec<String>,
    },
    /// Complete, waiting for a confirmed turn
    AwaitingConfirmation { pending: PendingOperation },
    /// Pending operation dropped on request; `None` if there was none
    Cancelled { pending: Option<PendingOperation> },
}

impl Reply {
    pub(crate) fn missing(pending: &PendingOperation) -> Self {
        Self::MissingFields {
            collection: pending.collection.clone(),
            action: pending.action,
            missing: pending.missing_fields.clone(),
            required: pending.required_fields.clone(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Read(output) => output.to_value(),
            Self::Write(outcome) => outcome.to_value(),
            Self::MissingFields {
                collection,
                action,
                missing,
                required,
            } => json!({
                "nextAction": "ask_missing_fields",
                "collection": collection,
                "action": action.as_str(),
                "missingFields": missing,
                "requiredFields": required,
            }),
            Self::AwaitingConfirmation { pending } => json!({
                "nextAction": "confirm",
                "pending": pending.to_value(),
            }),
            Self::Cancelled { pending } => json!({
                "nextAction": "none",
                "cancelled": pending.is_some(),
            }),
        }
    }
}

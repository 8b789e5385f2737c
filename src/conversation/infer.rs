//! Field inference from free text
//!
//! When a turn carries no structured fields, a few values can still be
//! recognized in the message itself. Inferred values only fill fields
//! the pending operation is still missing.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::pending::PendingOperation;
use crate::schema::CollectionSchema;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b").expect("email pattern")
});

/// Tax-style identifier such as `20-123456`
static LEGAL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2}-\d{3,}\b").expect("legal id pattern"));

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:proveedor|vendor|llamado|nombre|name)\s+([\p{L}\p{N}._-]{2,})")
        .expect("name pattern")
});

/// Recognizes `main_mail`, `legal_id` and `name` values in a message.
pub fn infer_fields(text: &str) -> Map<String, Value> {
    let mut out = Map::new();

    if let Some(m) = EMAIL_RE.find(text) {
        out.insert("main_mail".into(), Value::String(m.as_str().to_string()));
    }
    if let Some(m) = LEGAL_ID_RE.find(text) {
        out.insert("legal_id".into(), Value::String(m.as_str().to_string()));
    }
    if let Some(name) = NAME_RE.captures(text).and_then(|caps| caps.get(1)) {
        out.insert("name".into(), Value::String(name.as_str().to_string()));
    }

    out
}

/// Inferred values for fields the operation still misses and the
/// schema allows.
pub fn infer_for(
    text: &str,
    pending: &PendingOperation,
    schema: &CollectionSchema,
) -> Map<String, Value> {
    infer_fields(text)
        .into_iter()
        .filter(|(field, _)| schema.allows(field) && pending.missing_fields.contains(field))
        .collect()
}

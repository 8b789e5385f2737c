//! Collection schema definitions
//!
//! A collection schema is configuration data, not a document validator:
//! it names the fields an untrusted plan may mention, the aliases that
//! map human-friendly terms onto those fields, and the fields a write
//! must carry before it is allowed to run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity field assigned by the document store
pub const ID_FIELD: &str = "_id";

/// Write families that can declare required fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

impl WriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteKind::Insert => "insert",
            WriteKind::Update => "update",
            WriteKind::Delete => "delete",
        }
    }
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Schema of one storable entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name as stored; normalized on registration
    pub name: String,
    /// Allow-listed field names, in declaration order
    pub fields: Vec<String>,
    /// Human-friendly term → canonical field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,
    /// Fields a write must carry before it executes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub required: BTreeMap<WriteKind, Vec<String>>,
    /// Fields the store enforces as unique natural keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique: Vec<String>,
    /// Field filled with a generated identifier when an insert omits it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_id: Option<String>,
}

impl CollectionSchema {
    /// Create a schema with the given allow-list
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            aliases: BTreeMap::new(),
            required: BTreeMap::new(),
            unique: Vec::new(),
            auto_id: None,
        }
    }

    /// Add an alias
    pub fn with_alias(mut self, alias: impl Into<String>, field: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), field.into());
        self
    }

    /// Declare the required fields for a write family
    pub fn with_required<I, S>(mut self, kind: WriteKind, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required
            .insert(kind, fields.into_iter().map(Into::into).collect());
        self
    }

    /// Declare a unique field
    pub fn with_unique(mut self, field: impl Into<String>) -> Self {
        self.unique.push(field.into());
        self
    }

    /// Declare the auto-generated identifier field
    pub fn with_auto_id(mut self, field: impl Into<String>) -> Self {
        self.auto_id = Some(field.into());
        self
    }

    /// Returns true if the field is allow-listed
    pub fn allows(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Returns true if the field may appear in a projection or sort
    pub fn allows_projection(&self, field: &str) -> bool {
        field == ID_FIELD || self.allows(field)
    }

    /// Resolves a key through the alias map.
    ///
    /// Keys that are already allow-listed, or have no alias, are
    /// returned unchanged.
    pub fn resolve<'a>(&'a self, key: &'a str) -> &'a str {
        if self.allows(key) {
            return key;
        }
        self.aliases.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Required fields for a write family (empty if none declared)
    pub fn required_for(&self, kind: WriteKind) -> &[String] {
        self.required.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Validates the schema definition itself
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("collection name must not be empty".into());
        }
        if self.fields.is_empty() {
            return Err("allow-list must declare at least one field".into());
        }
        if let Some(bad) = self.fields.iter().find(|f| f.starts_with('$') || f.is_empty()) {
            return Err(format!("'{}' is not a valid field name", bad));
        }

        for (kind, fields) in &self.required {
            if let Some(missing) = fields.iter().find(|f| !self.allows(f)) {
                return Err(format!(
                    "required {} field '{}' is not allow-listed",
                    kind, missing
                ));
            }
        }

        if let Some(bad) = self.unique.iter().find(|f| !self.allows(f)) {
            return Err(format!("unique field '{}' is not allow-listed", bad));
        }

        if let Some(ref auto) = self.auto_id {
            if !self.allows(auto) {
                return Err(format!("auto_id field '{}' is not allow-listed", auto));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vendors() -> CollectionSchema {
        CollectionSchema::new("vendors", ["id", "name", "status", "rubro"])
            .with_alias("estado", "status")
            .with_alias("category", "rubro")
            .with_alias("secreto", "password")
            .with_required(WriteKind::Insert, ["name"])
            .with_unique("id")
    }

    #[test]
    fn test_resolve_alias() {
        let schema = vendors();
        assert_eq!(schema.resolve("estado"), "status");
        assert_eq!(schema.resolve("name"), "name");
    }

    #[test]
    fn test_alias_to_disallowed_field_stays_disallowed() {
        let schema = vendors();
        let resolved = schema.resolve("secreto");
        assert_eq!(resolved, "password");
        assert!(!schema.allows(resolved));
    }

    #[test]
    fn test_projection_allows_identity() {
        let schema = vendors();
        assert!(schema.allows_projection("_id"));
        assert!(!schema.allows("_id"));
    }

    #[test]
    fn test_required_for_undeclared_kind_is_empty() {
        let schema = vendors();
        assert_eq!(schema.required_for(WriteKind::Insert), ["name".to_string()]);
        assert!(schema.required_for(WriteKind::Delete).is_empty());
    }

    #[test]
    fn test_structure_rejects_unlisted_required_field() {
        let schema = vendors().with_required(WriteKind::Update, ["mobile"]);
        let err = schema.validate_structure().unwrap_err();
        assert!(err.contains("mobile"));
    }

    #[test]
    fn test_structure_rejects_operator_field() {
        let schema = CollectionSchema::new("bad", ["$where"]);
        assert!(schema.validate_structure().is_err());
    }

    #[test]
    fn test_schema_json_roundtrip_keeps_required_map() {
        let schema = vendors();
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("\"insert\""));
        let back: CollectionSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}

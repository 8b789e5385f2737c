//! In-memory schema registry keyed by normalized collection name

use std::collections::HashMap;

use super::errors::{SchemaError, SchemaResult};
use super::types::{CollectionSchema, WriteKind};

/// Normalizes a collection name.
///
/// Trims, lowercases and removes whitespace, `_` and `-`, so that
/// "Quote Lines", "quote_lines" and "QUOTE-LINES" all resolve to
/// "quotelines".
pub fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Registry of every collection a plan may address
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, CollectionSchema>,
}

impl SchemaRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema under its normalized name.
    ///
    /// Schemas are immutable once registered.
    pub fn register(&mut self, mut schema: CollectionSchema) -> SchemaResult<()> {
        schema
            .validate_structure()
            .map_err(|reason| SchemaError::invalid(&schema.name, reason))?;

        let key = normalize(&schema.name);
        if key.is_empty() {
            return Err(SchemaError::invalid(&schema.name, "name normalizes to nothing"));
        }
        if self.schemas.contains_key(&key) {
            return Err(SchemaError::DuplicateCollection(key));
        }

        schema.name = key.clone();
        self.schemas.insert(key, schema);
        Ok(())
    }

    /// Resolves a raw collection name to its schema.
    pub fn resolve(&self, collection: &str) -> SchemaResult<&CollectionSchema> {
        self.schemas
            .get(&normalize(collection))
            .ok_or_else(|| SchemaError::CollectionNotFound(collection.to_string()))
    }

    /// Returns true if the raw name resolves to a registered collection
    pub fn contains(&self, collection: &str) -> bool {
        self.schemas.contains_key(&normalize(collection))
    }

    /// Registered collection names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Iterates over registered schemas in name order
    pub fn iter(&self) -> impl Iterator<Item = &CollectionSchema> {
        let mut schemas: Vec<&CollectionSchema> = self.schemas.values().collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas.into_iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// The procurement collections shipped with the crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for schema in builtin_schemas() {
            // Builtin definitions are static and known to be valid.
            if let Err(e) = registry.register(schema) {
                tracing::error!(error = %e, "builtin schema rejected");
            }
        }
        registry
    }
}

fn builtin_schemas() -> Vec<CollectionSchema> {
    vec![
        CollectionSchema::new(
            "vendors",
            [
                "id",
                "name",
                "reference_name",
                "class",
                "rubro",
                "legal_type",
                "legal_id",
                "main_mail",
                "in_contact_name",
                "mobile",
                "status",
                "type",
                "score_avg",
            ],
        )
        .with_alias("category", "rubro")
        .with_alias("promedio", "score_avg")
        .with_alias("score", "score_avg")
        .with_alias("tipo", "class")
        .with_alias("estado", "status")
        .with_alias("vendorid", "id")
        .with_alias("vendor_id", "id")
        .with_alias("vendorId", "id")
        .with_alias("mail", "main_mail")
        .with_alias("email", "main_mail")
        .with_required(WriteKind::Insert, ["name", "class", "main_mail", "mobile"])
        .with_unique("id")
        .with_auto_id("id"),
        CollectionSchema::new("projects", ["id", "name"])
            .with_required(WriteKind::Insert, ["name"])
            .with_unique("id")
            .with_auto_id("id"),
        CollectionSchema::new("quotes", ["id", "project_id", "date"]),
        CollectionSchema::new(
            "quotelines",
            [
                "id",
                "line_no",
                "product_id",
                "reference",
                "price",
                "qty",
                "delivery_date",
                "project_id",
            ],
        ),
        CollectionSchema::new(
            "quoterequests",
            ["qr_id", "vendor_id", "date", "reference"],
        )
        .with_required(WriteKind::Insert, ["qr_id", "vendor_id", "date"])
        .with_unique("qr_id"),
        CollectionSchema::new(
            "quoterequestlines",
            [
                "id",
                "qr_id",
                "line_no",
                "qty",
                "um",
                "product_id",
                "reference",
                "reference_price",
                "currency",
                "unit_price",
                "desired_date",
                "promise_date",
                "cc_id",
                "cc_id_line",
                "status",
            ],
        )
        .with_alias("estado", "status")
        .with_alias("precio", "unit_price")
        .with_required(WriteKind::Insert, ["qr_id", "line_no", "qty", "product_id"]),
        CollectionSchema::new(
            "vendorevals",
            [
                "eval_id",
                "eval_name",
                "vendor_id",
                "start_date",
                "due_date",
                "type",
                "attach_id",
            ],
        )
        .with_unique("eval_id"),
        CollectionSchema::new(
            "vendorevallines",
            ["eval_id", "line_no", "name", "value", "check", "attach_id"],
        ),
        CollectionSchema::new("preselectvendors", ["project_id", "vendor_id", "status"]),
        CollectionSchema::new(
            "projectvendors",
            ["project_id", "vendor_id", "score", "status"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Quote Lines "), "quotelines");
        assert_eq!(normalize("quote_lines"), "quotelines");
        assert_eq!(normalize("QUOTE-LINES"), "quotelines");
        assert_eq!(normalize("vendors"), "vendors");
    }

    #[test]
    fn test_resolve_is_separator_insensitive() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.resolve("Vendor_Evals").unwrap().name, "vendorevals");
        assert_eq!(registry.resolve(" VENDORS ").unwrap().name, "vendors");
    }

    #[test]
    fn test_unknown_collection_fails_closed() {
        let registry = SchemaRegistry::builtin();
        let err = registry.resolve("users").unwrap_err();
        assert_eq!(err, SchemaError::CollectionNotFound("users".into()));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(CollectionSchema::new("projects", ["id"]))
            .unwrap();
        let err = registry
            .register(CollectionSchema::new("Projects", ["id", "name"]))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateCollection(_)));
    }

    #[test]
    fn test_registered_name_is_normalized() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(CollectionSchema::new("Purchase Orders", ["id"]))
            .unwrap();
        assert_eq!(registry.names(), vec!["purchaseorders"]);
    }

    #[test]
    fn test_builtin_registry_is_complete() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.len(), 10);
        assert!(registry.contains("quoterequestlines"));
    }
}

//! Compliance queries over the audit collection

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::record::AuditRecord;
use crate::plan::WriteAction;
use crate::store::{DocumentStore, FindOptions, StoreResult};

/// Filters audit records by collection, action and time range
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
    pub collection: Option<String>,
    pub action: Option<WriteAction>,
    /// Inclusive lower bound
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub until: Option<DateTime<Utc>>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn action(mut self, action: WriteAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Store filter for the equality parts of the query
    fn filter(&self) -> Map<String, Value> {
        let mut filter = Map::new();
        if let Some(collection) = &self.collection {
            filter.insert("collection".into(), Value::String(collection.clone()));
        }
        if let Some(action) = self.action {
            filter.insert("action".into(), Value::String(action.as_str().into()));
        }
        filter
    }

    fn in_range(&self, record: &AuditRecord) -> bool {
        self.since.map_or(true, |since| record.timestamp >= since)
            && self.until.map_or(true, |until| record.timestamp < until)
    }

    /// Returns matching records, oldest first.
    ///
    /// Documents that do not parse as audit records are skipped.
    pub fn run(
        &self,
        store: &dyn DocumentStore,
        audit_collection: &str,
    ) -> StoreResult<Vec<AuditRecord>> {
        let docs = store.find(audit_collection, &self.filter(), &FindOptions::default())?;

        let mut records: Vec<AuditRecord> = docs
            .iter()
            .filter_map(AuditRecord::from_document)
            .filter(|record| self.in_range(record))
            .collect();
        records.sort_by_key(|record| record.timestamp);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AUDIT_COLLECTION;
    use crate::store::InMemoryStore;
    use chrono::Duration;

    fn seed(store: &InMemoryStore, records: &[AuditRecord]) {
        store
            .seed(
                AUDIT_COLLECTION,
                records
                    .iter()
                    .map(|r| Value::Object(r.to_document()))
                    .collect(),
            )
            .unwrap();
    }

    #[test]
    fn test_filter_by_collection_and_action() {
        let store = InMemoryStore::new();
        seed(
            &store,
            &[
                AuditRecord::new(WriteAction::InsertOne, "vendors"),
                AuditRecord::new(WriteAction::UpdateOne, "vendors"),
                AuditRecord::new(WriteAction::InsertOne, "projects"),
            ],
        );

        let vendors = AuditQuery::new()
            .collection("vendors")
            .run(&store, AUDIT_COLLECTION)
            .unwrap();
        assert_eq!(vendors.len(), 2);

        let inserts = AuditQuery::new()
            .action(WriteAction::InsertOne)
            .run(&store, AUDIT_COLLECTION)
            .unwrap();
        assert_eq!(inserts.len(), 2);
        assert!(inserts.iter().all(|r| r.action == WriteAction::InsertOne));
    }

    #[test]
    fn test_time_range() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        let mut old = AuditRecord::new(WriteAction::DeleteOne, "projects");
        old.timestamp = now - Duration::days(10);
        let recent = AuditRecord::new(WriteAction::DeleteOne, "projects");
        seed(&store, &[recent.clone(), old.clone()]);

        let all = AuditQuery::new().run(&store, AUDIT_COLLECTION).unwrap();
        assert_eq!(all, vec![old.clone(), recent.clone()]);

        let last_day = AuditQuery::new()
            .since(now - Duration::days(1))
            .run(&store, AUDIT_COLLECTION)
            .unwrap();
        assert_eq!(last_day, vec![recent]);

        let before = AuditQuery::new()
            .until(now - Duration::days(1))
            .run(&store, AUDIT_COLLECTION)
            .unwrap();
        assert_eq!(before, vec![old]);
    }
}

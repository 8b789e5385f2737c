//! Write Atomicity Tests
//!
//! Every executed write is one transaction: snapshots, mutation and
//! audit record commit together or not at all.
//! - A committed write adds exactly one audit record
//! - Audit snapshots match independently queried state
//! - Unscoped bulk mutations stop at the guard
//! - A failure anywhere in the transaction leaves no trace

use opguard::audit::{AuditQuery, AuditRecord, AUDIT_COLLECTION};
use opguard::plan::{WriteAction, WriteOp};
use opguard::schema::SchemaRegistry;
use opguard::store::{points, DocumentStore, FindOptions, InMemoryStore, Snapshot};
use opguard::write::{WriteError, WriteExecutor, WriteOptions, WriteOutcome};
use serde_json::{json, Map, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (SchemaRegistry, InMemoryStore) {
    let registry = SchemaRegistry::builtin();
    let store = InMemoryStore::from_registry(&registry);
    store
        .seed(
            "quoterequestlines",
            vec![
                json!({"id": "L1", "qr_id": "QR1", "line_no": 1, "status": "done", "unit_price": 10}),
                json!({"id": "L2", "qr_id": "QR1", "line_no": 2, "status": "done", "unit_price": 12}),
                json!({"id": "L3", "qr_id": "QR2", "line_no": 1, "status": "open", "unit_price": 8}),
            ],
        )
        .unwrap();
    (registry, store)
}

fn op(v: Value) -> WriteOp {
    serde_json::from_value(v).unwrap()
}

fn find(store: &InMemoryStore, collection: &str, filter: Value) -> Vec<Value> {
    let filter: Map<String, Value> = match filter {
        Value::Object(m) => m,
        _ => panic!("expected object"),
    };
    store
        .find(collection, &filter, &FindOptions::default())
        .unwrap()
}

fn audit_records(store: &InMemoryStore) -> Vec<AuditRecord> {
    AuditQuery::new().run(store, AUDIT_COLLECTION).unwrap()
}

// =============================================================================
// Audit Consistency
// =============================================================================

/// updateOne sets status and clears unit_price on line L1.
#[test]
fn test_update_one_before_and_after() {
    let (registry, store) = setup();
    let exec = WriteExecutor::new(&registry, &store).allow_writes(true);

    let outcome = exec
        .run(
            "marcar L1 en espera",
            &op(json!({
                "action": "updateOne",
                "collection": "quoterequestlines",
                "filter": {"id": "L1"},
                "update": {"$set": {"status": "waiting"}, "$unset": {"unit_price": ""}}
            })),
            WriteOptions::default(),
        )
        .unwrap();

    let WriteOutcome::Executed(executed) = outcome else {
        panic!("expected execution");
    };
    let after = executed.after.unwrap();
    assert_eq!(after[0]["status"], "waiting");
    assert!(after[0].get("unit_price").is_none());
    assert_eq!(executed.before.unwrap()[0]["status"], "done");
    assert_eq!(executed.affected, 1);
}

#[test]
fn test_each_write_adds_one_matching_audit_record() {
    let (registry, store) = setup();
    let exec = WriteExecutor::new(&registry, &store).allow_writes(true);

    let before_state = find(&store, "quoterequestlines", json!({"qr_id": "QR1"}));

    let outcome = exec
        .run(
            "subir precio QR1",
            &op(json!({
                "action": "updateMany",
                "collection": "quoterequestlines",
                "filter": {"qr_id": "QR1"},
                "update": {"$inc": {"unit_price": 1}}
            })),
            WriteOptions::default(),
        )
        .unwrap();
    assert!(outcome.is_executed());

    let after_state = find(&store, "quoterequestlines", json!({"qr_id": "QR1"}));
    let records = audit_records(&store);
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.action, WriteAction::UpdateMany);
    assert_eq!(record.collection, "quoterequestlines");
    assert_eq!(record.source_text, "subir precio QR1");
    assert_eq!(record.before, Some(Value::Array(before_state)));
    assert_eq!(record.after, Some(Value::Array(after_state)));

    exec.run(
        "borrar L3",
        &op(json!({"action": "deleteOne", "collection": "quoterequestlines", "filter": {"id": "L3"}})),
        WriteOptions::default(),
    )
    .unwrap();
    assert_eq!(audit_records(&store).len(), 2);
}

// =============================================================================
// Bulk Guard
// =============================================================================

#[test]
fn test_unscoped_delete_many_needs_confirmation() {
    let (registry, store) = setup();
    let exec = WriteExecutor::new(&registry, &store).allow_writes(true);
    let count = store.len("quoterequestlines").unwrap();

    let outcome = exec
        .run(
            "borrar todo",
            &op(json!({"action": "deleteMany", "collection": "quoterequestlines", "filter": {}})),
            WriteOptions::default(),
        )
        .unwrap();

    assert!(matches!(outcome, WriteOutcome::ConfirmRequired { .. }));
    assert_eq!(outcome.to_value()["confirmRequired"], true);
    assert_eq!(store.len("quoterequestlines").unwrap(), count);
    assert!(audit_records(&store).is_empty());
}

/// A filter that sanitizes to nothing is as unscoped as `{}`.
#[test]
fn test_filter_of_unknown_fields_is_unscoped() {
    let (registry, store) = setup();
    let exec = WriteExecutor::new(&registry, &store).allow_writes(true);

    let outcome = exec
        .run(
            "",
            &op(json!({
                "action": "updateMany",
                "collection": "quoterequestlines",
                "filter": {"tenant": "mine"},
                "update": {"$set": {"status": "x"}}
            })),
            WriteOptions::default(),
        )
        .unwrap();
    assert!(matches!(outcome, WriteOutcome::ConfirmRequired { .. }));
    assert!(find(&store, "quoterequestlines", json!({"status": "x"})).is_empty());
}

#[test]
fn test_dry_run_touches_nothing() {
    let (registry, store) = setup();
    let exec = WriteExecutor::new(&registry, &store).allow_writes(true);
    let before = Snapshot::capture(&store).unwrap();

    let outcome = exec
        .run(
            "",
            &op(json!({"action": "deleteOne", "collection": "quoterequestlines", "filter": {"id": "L1"}})),
            WriteOptions::dry_run(),
        )
        .unwrap();

    assert_eq!(outcome.to_value()["dryRun"], true);
    assert_eq!(Snapshot::capture(&store).unwrap(), before);
}

// =============================================================================
// Abort Paths
// =============================================================================

#[test]
fn test_audit_failure_rolls_back_mutation() {
    let (registry, store) = setup();
    store.fail_points().arm(points::INSERT, Some(AUDIT_COLLECTION));
    let exec = WriteExecutor::new(&registry, &store).allow_writes(true);
    let before = Snapshot::capture(&store).unwrap();

    let err = exec
        .run(
            "",
            &op(json!({"action": "deleteMany", "collection": "quoterequestlines", "filter": {"qr_id": "QR1"}})),
            WriteOptions::default(),
        )
        .unwrap_err();

    assert!(matches!(err, WriteError::Store(_)));
    assert_eq!(Snapshot::capture(&store).unwrap(), before);
}

#[test]
fn test_commit_failure_leaves_no_orphan_audit() {
    let (registry, store) = setup();
    store.fail_points().arm(points::COMMIT, None);
    let exec = WriteExecutor::new(&registry, &store).allow_writes(true);

    let err = exec
        .run(
            "",
            &op(json!({
                "action": "insertOne",
                "collection": "quoterequestlines",
                "data": {"qr_id": "QR3", "line_no": 1, "qty": 2, "product_id": "X"}
            })),
            WriteOptions::default(),
        )
        .unwrap_err();

    assert_eq!(err.code(), "OPG_STORE_INJECTED");
    assert_eq!(store.len("quoterequestlines").unwrap(), 3);
    assert!(audit_records(&store).is_empty());

    store.fail_points().clear();
    let outcome = exec
        .run(
            "",
            &op(json!({
                "action": "insertOne",
                "collection": "quoterequestlines",
                "data": {"qr_id": "QR3", "line_no": 1, "qty": 2, "product_id": "X"}
            })),
            WriteOptions::default(),
        )
        .unwrap();
    assert!(outcome.is_executed());
    assert_eq!(audit_records(&store).len(), 1);
}

#[test]
fn test_unique_violation_aborts() {
    let registry = SchemaRegistry::builtin();
    let store = InMemoryStore::from_registry(&registry);
    store
        .seed("projects", vec![json!({"id": "P1", "name": "Plant"})])
        .unwrap();
    let exec = WriteExecutor::new(&registry, &store).allow_writes(true);

    let err = exec
        .run(
            "",
            &op(json!({
                "action": "insertMany",
                "collection": "projects",
                "data": [{"id": "P2", "name": "Bridge"}, {"id": "P1", "name": "Dup"}]
            })),
            WriteOptions::default(),
        )
        .unwrap_err();

    assert_eq!(err.code(), "OPG_STORE_DUPLICATE_KEY");
    assert_eq!(store.len("projects").unwrap(), 1);
    assert!(audit_records(&store).is_empty());
}

#[test]
fn test_inc_overflow_aborts_and_store_stays_usable() {
    let (registry, store) = setup();
    let exec = WriteExecutor::new(&registry, &store).allow_writes(true);
    let before = Snapshot::capture(&store).unwrap();

    let err = exec
        .run(
            "",
            &op(json!({
                "action": "updateOne",
                "collection": "quoterequestlines",
                "filter": {"id": "L1"},
                "update": {"$inc": {"unit_price": i64::MAX}}
            })),
            WriteOptions::default(),
        )
        .unwrap_err();

    assert_eq!(err.code(), "OPG_STORE_INVALID_UPDATE");
    assert_eq!(Snapshot::capture(&store).unwrap(), before);
    assert!(audit_records(&store).is_empty());

    let outcome = exec
        .run(
            "",
            &op(json!({
                "action": "updateOne",
                "collection": "quoterequestlines",
                "filter": {"id": "L1"},
                "update": {"$inc": {"unit_price": 1}}
            })),
            WriteOptions::default(),
        )
        .unwrap();
    assert!(outcome.is_executed());
    assert_eq!(find(&store, "quoterequestlines", json!({"id": "L1"}))[0]["unit_price"], 11);
}

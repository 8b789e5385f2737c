//! Conversation Flow Tests
//!
//! Slot-filling across turns through the engine:
//! - Missing required fields are reported, never executed
//! - Later turns fill fields, last value wins
//! - A confirmed complete operation executes once and is cleared
//! - Idle operations expire

use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::Duration;
use opguard::audit::{AuditQuery, AUDIT_COLLECTION};
use opguard::config::EngineConfig;
use opguard::conversation::{ConversationStore, InMemoryConversationStore, PendingOperation};
use opguard::engine::{Engine, Reply, Turn};
use opguard::plan::WriteOp;
use opguard::schema::SchemaRegistry;
use opguard::store::{DocumentStore, FindOptions, InMemoryStore};
use opguard::write::WriteOutcome;
use serde_json::{json, Map, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn obj(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => panic!("expected object"),
    }
}

fn setup() -> (Arc<InMemoryStore>, Engine) {
    let registry = SchemaRegistry::builtin();
    let store = Arc::new(InMemoryStore::from_registry(&registry));
    let engine = Engine::new(registry, store.clone(), EngineConfig::default().with_writes());
    (store, engine)
}

fn vendor_insert() -> Value {
    json!({
        "mode": "write",
        "operation": {
            "action": "insertOne",
            "collection": "vendors",
            "data": {"name": "Acme", "class": "Material"}
        }
    })
}

fn missing(reply: &Reply) -> Vec<String> {
    match reply {
        Reply::MissingFields { missing, .. } => missing.clone(),
        other => panic!("expected missing fields, got {:?}", other),
    }
}

// =============================================================================
// Multi-turn Insert
// =============================================================================

#[test]
fn test_two_turn_insert_then_confirm() {
    let (store, engine) = setup();

    let reply = engine
        .handle(&Turn::plan(vendor_insert()).with_text("alta proveedor Acme").in_conversation("c1"))
        .unwrap();
    assert_eq!(missing(&reply), ["main_mail", "mobile"]);
    assert_eq!(
        reply.to_value()["nextAction"],
        "ask_missing_fields"
    );

    let reply = engine
        .handle(&Turn::default().in_conversation("c1").with_fields(obj(json!({"main_mail": "a@acme.com"}))))
        .unwrap();
    assert_eq!(missing(&reply), ["mobile"]);

    let reply = engine
        .handle(&Turn::default().in_conversation("c1").with_fields(obj(json!({"mobile": "555-0101"}))))
        .unwrap();
    assert!(matches!(reply, Reply::AwaitingConfirmation { .. }));
    assert_eq!(store.len("vendors").unwrap(), 0);

    let reply = engine
        .handle(&Turn::text("confirmo").in_conversation("c1").confirmed())
        .unwrap();
    let Reply::Write(WriteOutcome::Executed(executed)) = reply else {
        panic!("expected execution");
    };
    assert_eq!(executed.affected, 1);

    let stored = store
        .find("vendors", &Map::new(), &FindOptions::default())
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["main_mail"], "a@acme.com");
    assert_eq!(stored[0]["mobile"], "555-0101");
    assert!(stored[0]["id"].as_str().unwrap().starts_with("AUTO-"));

    assert!(engine.conversations().get("c1").unwrap().is_none());
    assert_eq!(AuditQuery::new().run(store.as_ref(), AUDIT_COLLECTION).unwrap().len(), 1);

    let metrics = engine.metrics().snapshot();
    assert_eq!(metrics.writes_committed, 1);
    assert_eq!(metrics.pending_cleared, 1);
}

#[test]
fn test_fields_inferred_from_text() {
    let (_store, engine) = setup();
    engine
        .handle(&Turn::plan(vendor_insert()).in_conversation("c2"))
        .unwrap();

    let reply = engine
        .handle(&Turn::text("escribile a compras@acme.com").in_conversation("c2"))
        .unwrap();
    assert_eq!(missing(&reply), ["mobile"]);

    let pending = engine.conversations().get("c2").unwrap().unwrap();
    assert_eq!(pending.filled["main_mail"], "compras@acme.com");
}

#[test]
fn test_confirm_while_incomplete_does_not_execute() {
    let (store, engine) = setup();
    engine
        .handle(&Turn::plan(vendor_insert()).in_conversation("c3"))
        .unwrap();

    let reply = engine
        .handle(&Turn::text("dale").in_conversation("c3").confirmed())
        .unwrap();
    assert_eq!(missing(&reply), ["main_mail", "mobile"]);
    assert_eq!(store.len("vendors").unwrap(), 0);
}

#[test]
fn test_new_write_plan_replaces_pending() {
    let (_store, engine) = setup();
    engine
        .handle(&Turn::plan(vendor_insert()).in_conversation("c4"))
        .unwrap();

    let reply = engine
        .handle(
            &Turn::plan(json!({
                "mode": "write",
                "operation": {"action": "insertOne", "collection": "projects", "data": {"name": "Plant"}}
            }))
            .in_conversation("c4"),
        )
        .unwrap();
    assert!(matches!(reply, Reply::AwaitingConfirmation { .. }));

    let pending = engine.conversations().get("c4").unwrap().unwrap();
    assert_eq!(pending.collection, "projects");
}

#[test]
fn test_conversations_are_isolated() {
    let (_store, engine) = setup();
    engine
        .handle(&Turn::plan(vendor_insert()).in_conversation("a"))
        .unwrap();
    engine
        .handle(&Turn::default().in_conversation("b").with_fields(obj(json!({"mobile": "1"}))))
        .unwrap_err();

    let pending = engine.conversations().get("a").unwrap().unwrap();
    assert_eq!(pending.missing_fields, ["main_mail", "mobile"]);
}

// =============================================================================
// Merge Convergence
// =============================================================================

fn pending() -> PendingOperation {
    let registry = SchemaRegistry::builtin();
    let op: WriteOp = serde_json::from_value(json!({
        "action": "insertOne",
        "collection": "vendors",
        "data": {}
    }))
    .unwrap();
    PendingOperation::from_write(&op, registry.resolve("vendors").unwrap()).unwrap()
}

#[test]
fn test_merges_accumulate() {
    let mut op = pending();
    op.merge(&obj(json!({"a": 1})));
    op.merge(&obj(json!({"b": 2})));
    assert_eq!(Value::Object(op.filled), json!({"a": 1, "b": 2}));
}

#[test]
fn test_last_merge_wins() {
    let mut op = pending();
    op.merge(&obj(json!({"a": 1})));
    op.merge(&obj(json!({"a": 2})));
    assert_eq!(Value::Object(op.filled), json!({"a": 2}));
}

#[test]
fn test_store_merge_is_atomic_under_contention() {
    let store = Arc::new(InMemoryConversationStore::new());
    store.put("c", pending()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut fields = Map::new();
                fields.insert(format!("f{}", i), json!(i));
                store.merge("c", &fields).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.get("c").unwrap().unwrap().filled.len(), 8);
}

// =============================================================================
// Expiry
// =============================================================================

#[test]
fn test_idle_pending_expires() {
    let store = InMemoryConversationStore::with_ttl(Some(Duration::milliseconds(1)));
    store.put("c", pending()).unwrap();
    thread::sleep(StdDuration::from_millis(20));

    assert!(store.get("c").unwrap().is_none());
}

#[test]
fn test_expired_pending_is_not_continued() {
    let registry = SchemaRegistry::builtin();
    let store = Arc::new(InMemoryStore::from_registry(&registry));
    let conversations = Arc::new(InMemoryConversationStore::with_ttl(Some(Duration::milliseconds(1))));
    let engine = Engine::new(registry, store, EngineConfig::default().with_writes())
        .with_conversations(conversations);

    engine
        .handle(&Turn::plan(vendor_insert()).in_conversation("c"))
        .unwrap();
    thread::sleep(StdDuration::from_millis(20));

    let err = engine
        .handle(&Turn::default().in_conversation("c").with_fields(obj(json!({"mobile": "1"}))))
        .unwrap_err();
    assert_eq!(err.code(), "OPG_ENGINE_NO_PLAN");
    assert_eq!(engine.metrics().snapshot().pending_expired, 1);
}

//! Gateway Tests
//!
//! The async front runs engine calls on blocking workers and can be
//! shared across tasks.

use std::sync::Arc;

use opguard::config::EngineConfig;
use opguard::engine::{Engine, Gateway, Reply, StaticProducer, Turn};
use opguard::schema::SchemaRegistry;
use opguard::store::InMemoryStore;
use opguard::write::WriteOutcome;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn gateway() -> Gateway {
    let registry = SchemaRegistry::builtin();
    let store = Arc::new(InMemoryStore::from_registry(&registry));
    store
        .seed(
            "vendors",
            vec![
                json!({"id": "V1", "name": "Acme", "status": "Activo"}),
                json!({"id": "V2", "name": "Beta", "status": "Inactivo"}),
            ],
        )
        .unwrap();

    let producer = StaticProducer::new()
        .with_plan(
            "proveedores activos",
            json!({"mode": "find", "collection": "vendors", "filter": {"estado": "Activo"}}),
        )
        .with_plan(
            "borrar todos los proveedores",
            json!({"mode": "write", "operation": {"action": "deleteMany", "collection": "vendors", "filter": {}}}),
        );

    let engine = Engine::new(registry, store, EngineConfig::default().with_writes())
        .with_producer(Arc::new(producer));
    Gateway::new(engine)
}

// =============================================================================
// Routing
// =============================================================================

#[tokio::test]
async fn test_text_turn_goes_through_producer() {
    let gateway = gateway();

    let reply = gateway.handle(Turn::text("proveedores activos")).await.unwrap();
    let value = reply.to_value();
    assert_eq!(value.as_array().unwrap().len(), 1);
    assert_eq!(value[0]["id"], "V1");
}

#[tokio::test]
async fn test_unknown_text_is_producer_error() {
    let gateway = gateway();

    let err = gateway.handle(Turn::text("hola")).await.unwrap_err();
    assert_eq!(err.code(), "OPG_ENGINE_PRODUCER");
}

#[tokio::test]
async fn test_bulk_delete_needs_confirm_then_force() {
    let gateway = gateway();

    let reply = gateway
        .handle(Turn::text("borrar todos los proveedores").confirmed())
        .await
        .unwrap();
    assert!(matches!(reply, Reply::Write(WriteOutcome::ConfirmRequired { .. })));

    let reply = gateway
        .handle(Turn::text("borrar todos los proveedores").confirmed().forced())
        .await
        .unwrap();
    let Reply::Write(WriteOutcome::Executed(executed)) = reply else {
        panic!("expected execution");
    };
    assert_eq!(executed.affected, 2);
    assert_eq!(gateway.engine().metrics().snapshot().guards_triggered, 1);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_reads() {
    let gateway = gateway();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.handle(Turn::text("proveedores activos")).await })
        })
        .collect();

    for task in tasks {
        let reply = task.await.unwrap().unwrap();
        assert_eq!(reply.to_value().as_array().unwrap().len(), 1);
    }
    assert_eq!(gateway.engine().metrics().snapshot().reads_executed, 16);
}

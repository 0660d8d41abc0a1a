//! End-to-end tests for the event bus over the in-process binding.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use conduit::prelude::*;
use serde_json::json;

fn counter(hits: &Arc<AtomicU32>) -> Arc<dyn IntegrationHandler> {
    let hits = hits.clone();
    Arc::new(handler_fn(move |_| {
        let hits = hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }))
}

async fn connect(registry: &Arc<HandlerRegistry>, emitter: &Arc<LocalEmitter>) -> Arc<EventBus> {
    let bus = EventBus::connect(&BusConfig::default(), registry.clone(), emitter.clone())
        .await
        .unwrap();
    bus.start().await.unwrap();
    bus
}

#[tokio::test]
async fn test_unhandled_event_reaches_observers_once() {
    let registry = Arc::new(HandlerRegistry::new());
    let emitter = Arc::new(LocalEmitter::new());
    let mut observer = emitter.notifications();
    let bus = connect(&registry, &emitter).await;

    let created = Integration::from_parts("ItemCreated", json!({ "id": "x" }), "e1");
    bus.publish(&created, None).await.unwrap();

    let seen = observer.recv().await.unwrap();
    assert_eq!(seen.topic, "ItemCreated");
    assert_eq!(seen.payload, json!({ "id": "x" }));

    bus.publish(&created, None).await.unwrap();
    assert!(observer.try_recv().is_err());
    assert!(bus.is_processed("ItemCreated:e1"));
}

#[tokio::test]
async fn test_republish_leaves_handler_count_unchanged() {
    let registry = Arc::new(HandlerRegistry::new());
    let emitter = Arc::new(LocalEmitter::new());
    let registered = Arc::new(AtomicU32::new(0));
    registry.register_integration("ItemCreated", counter(&registered));
    let bus = connect(&registry, &emitter).await;

    let created = Integration::from_parts("ItemCreated", json!({ "id": "x" }), "e1");
    bus.publish(&created, None).await.unwrap();
    assert_eq!(registered.load(Ordering::SeqCst), 1);

    bus.publish(&created, None).await.unwrap();
    assert_eq!(registered.load(Ordering::SeqCst), 1);

    let another = Integration::from_parts("ItemCreated", json!({ "id": "y" }), "e2");
    bus.publish(&another, None).await.unwrap();
    assert_eq!(registered.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_duplicates_deliver_once() {
    let registry = Arc::new(HandlerRegistry::new());
    let emitter = Arc::new(LocalEmitter::new());
    let delivered = Arc::new(AtomicU32::new(0));
    registry.register_integration("ItemCreated", counter(&delivered));
    let bus = connect(&registry, &emitter).await;

    let created = Integration::from_parts("ItemCreated", json!({ "id": "x" }), "e1");
    let publishes = (0..8).map(|_| {
        let bus = bus.clone();
        let created = created.clone();
        tokio::spawn(async move { bus.publish(&created, None).await })
    });
    for result in join_handles(publishes).await {
        result.unwrap();
    }

    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mediator_republishes_through_bus() {
    #[derive(Debug, serde::Serialize)]
    struct ItemShipped {
        id: String,
        at: chrono::DateTime<chrono::Utc>,
    }

    impl DomainEvent for ItemShipped {
        fn date_time_occurred(&self) -> chrono::DateTime<chrono::Utc> {
            self.at
        }
    }

    let registry = Arc::new(HandlerRegistry::new());
    let emitter = Arc::new(LocalEmitter::new());
    let shipped = Arc::new(AtomicU32::new(0));
    registry.register_integration("ItemShipped", counter(&shipped));
    let bus = connect(&registry, &emitter).await;
    let mediator = Mediator::new(registry.clone(), emitter.clone()).with_publisher(bus.clone());

    let mut observer = emitter.notifications();
    mediator
        .publish_event(Arc::new(ItemShipped {
            id: "x".into(),
            at: chrono::Utc::now(),
        }))
        .await
        .unwrap();

    assert_eq!(shipped.load(Ordering::SeqCst), 1);
    assert_eq!(observer.recv().await.unwrap().payload["id"], "x");
    assert!(observer.try_recv().is_err());
}

async fn join_handles<I, T>(handles: I) -> Vec<T>
where
    I: IntoIterator<Item = tokio::task::JoinHandle<T>>,
{
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

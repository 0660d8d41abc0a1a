//! Local fan-out for in-process listeners and realtime observers

use crate::handler::IntegrationHandler;
use dashmap::DashMap;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Default capacity of the observer channel
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// A topic and payload delivered to realtime observers
#[derive(Debug, Clone, PartialEq)]
pub struct LocalNotification {
    pub topic: String,
    pub payload: Value,
}

/// In-process emitter.
///
/// Topic listeners are awaited in place by [`LocalEmitter::emit`]. Every emit
/// is also broadcast to observers obtained from [`LocalEmitter::notifications`];
/// slow observers lag and lose the oldest notifications rather than blocking
/// publishers.
pub struct LocalEmitter {
    listeners: DashMap<String, Vec<Arc<dyn IntegrationHandler>>>,
    notifications: broadcast::Sender<LocalNotification>,
}

impl LocalEmitter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_NOTIFICATION_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (notifications, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: DashMap::new(),
            notifications,
        }
    }

    /// Register a listener for `topic`
    pub fn on(&self, topic: impl Into<String>, listener: Arc<dyn IntegrationHandler>) {
        let topic = topic.into();
        debug!(topic = %topic, "Local listener registered");
        self.listeners.entry(topic).or_default().push(listener);
    }

    /// Remove every listener for `topic`, returning how many were removed
    pub fn remove_all(&self, topic: &str) -> usize {
        self.listeners
            .remove(topic)
            .map(|(_, listeners)| listeners.len())
            .unwrap_or(0)
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners.get(topic).map(|l| l.len()).unwrap_or(0)
    }

    /// Subscribe to every emitted notification
    pub fn notifications(&self) -> broadcast::Receiver<LocalNotification> {
        self.notifications.subscribe()
    }

    /// Emit `payload` on `topic`.
    ///
    /// Best-effort: listener failures are logged and never returned. Returns
    /// the number of listeners that completed successfully.
    pub async fn emit(&self, topic: &str, payload: Value) -> usize {
        // Clone the list out so no map guard is held across the await.
        let listeners: Vec<Arc<dyn IntegrationHandler>> = self
            .listeners
            .get(topic)
            .map(|l| l.value().clone())
            .unwrap_or_default();

        let results = join_all(listeners.iter().map(|l| l.handle(&payload))).await;
        let mut succeeded = 0;
        for result in results {
            match result {
                Ok(()) => succeeded += 1,
                Err(e) => warn!(topic = %topic, error = %e, "Local listener failed"),
            }
        }

        let observers = self
            .notifications
            .send(LocalNotification {
                topic: topic.to_string(),
                payload,
            })
            .unwrap_or(0);
        trace!(topic = %topic, listeners = listeners.len(), observers, "Emitted locally");

        succeeded
    }
}

impl Default for LocalEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerError, handler_fn};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(counter: Arc<AtomicU32>) -> Arc<dyn IntegrationHandler> {
        Arc::new(handler_fn(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
    }

    #[tokio::test]
    async fn test_emit_reaches_topic_listeners_only() {
        let emitter = LocalEmitter::new();
        let hits = Arc::new(AtomicU32::new(0));
        emitter.on("ItemCreated", counting(hits.clone()));
        emitter.on("ItemCreated", counting(hits.clone()));
        emitter.on("ItemDeleted", counting(hits.clone()));

        assert_eq!(emitter.emit("ItemCreated", json!({ "id": "x" })).await, 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_listener_is_isolated() {
        let emitter = LocalEmitter::new();
        let hits = Arc::new(AtomicU32::new(0));
        emitter.on(
            "ItemCreated",
            Arc::new(handler_fn(|_| async { Err(HandlerError::failed("boom")) })),
        );
        emitter.on("ItemCreated", counting(hits.clone()));

        assert_eq!(emitter.emit("ItemCreated", json!({})).await, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_observers_receive_every_emit() {
        let emitter = LocalEmitter::new();
        let mut observer = emitter.notifications();

        emitter.emit("ItemCreated", json!({ "id": "x" })).await;

        let notification = observer.recv().await.unwrap();
        assert_eq!(notification.topic, "ItemCreated");
        assert_eq!(notification.payload, json!({ "id": "x" }));
    }

    #[tokio::test]
    async fn test_remove_all() {
        let emitter = LocalEmitter::new();
        let hits = Arc::new(AtomicU32::new(0));
        emitter.on("Topic", counting(hits.clone()));

        assert_eq!(emitter.remove_all("Topic"), 1);
        assert_eq!(emitter.remove_all("Topic"), 0);
        assert_eq!(emitter.listener_count("Topic"), 0);
        assert_eq!(emitter.emit("Topic", json!({})).await, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}

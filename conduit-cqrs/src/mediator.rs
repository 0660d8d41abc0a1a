//! Mediator: the single dispatch point for commands, queries and domain events

use crate::command::Command;
use crate::error::ApiError;
use crate::query::Query;
use crate::registry::HandlerRegistry;
use conduit_events::{
    DomainEvent, HandlerError, HasDomainEvents, Integration, IntegrationPublisher, LocalEmitter,
    RecordedEvent,
};
use conduit_validation::Validate;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Routes one inbound command or query to exactly one handler, and fans
/// domain events out to their handlers.
pub struct Mediator {
    registry: Arc<HandlerRegistry>,
    emitter: Arc<LocalEmitter>,
    publisher: Option<Arc<dyn IntegrationPublisher>>,
}

impl Mediator {
    pub fn new(registry: Arc<HandlerRegistry>, emitter: Arc<LocalEmitter>) -> Self {
        Self {
            registry,
            emitter,
            publisher: None,
        }
    }

    /// Republish every domain event as an integration through `publisher`
    pub fn with_publisher(mut self, publisher: Arc<dyn IntegrationPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn emitter(&self) -> &Arc<LocalEmitter> {
        &self.emitter
    }

    /// Validate raw JSON against `C`'s descriptor, then deserialize and dispatch.
    pub async fn send_command<C: Command>(&self, data: Value) -> Result<C::Output, ApiError> {
        C::validate_json(&data)?;
        let command: C = decode(C::name(), data)?;
        self.dispatch_command(command).await
    }

    /// Validate an already-typed command through its JSON form, then dispatch.
    pub async fn execute_command<C: Command>(&self, command: C) -> Result<C::Output, ApiError> {
        command.validate()?;
        self.dispatch_command(command).await
    }

    pub async fn send_query<Q: Query>(&self, data: Value) -> Result<Q::Output, ApiError> {
        Q::validate_json(&data)?;
        let query: Q = decode(Q::name(), data)?;
        self.dispatch_query(query).await
    }

    pub async fn execute_query<Q: Query>(&self, query: Q) -> Result<Q::Output, ApiError> {
        query.validate()?;
        self.dispatch_query(query).await
    }

    async fn dispatch_command<C: Command>(&self, command: C) -> Result<C::Output, ApiError> {
        let name = C::name();
        let handler = self
            .registry
            .command_handler(name)
            .ok_or_else(|| ApiError::not_found(format!("No handler found for command {}", name)))?;

        debug!(command = name, "Executing command");
        let output = handler.handle_any(Box::new(command)).await.map_err(|e| {
            warn!(command = name, error = %e, "Command handler failed");
            ApiError::from(e)
        })?;

        output
            .downcast::<C::Output>()
            .map(|output| *output)
            .map_err(|_| ApiError::internal(format!("Result type mismatch for command {}", name)))
    }

    async fn dispatch_query<Q: Query>(&self, query: Q) -> Result<Q::Output, ApiError> {
        let name = Q::name();
        let handler = self
            .registry
            .query_handler(name)
            .ok_or_else(|| ApiError::not_found(format!("No handler found for query {}", name)))?;

        debug!(query = name, "Executing query");
        let output = handler.handle_any(Box::new(query)).await.map_err(|e| {
            warn!(query = name, error = %e, "Query handler failed");
            ApiError::from(e)
        })?;

        output
            .downcast::<Q::Output>()
            .map(|output| *output)
            .map_err(|_| ApiError::internal(format!("Result type mismatch for query {}", name)))
    }

    /// Run every handler registered for the event concurrently.
    ///
    /// All handlers run to completion; the first failure in registration order
    /// is returned. The event reaches the local fan-out exactly once: through
    /// the attached publisher's delivery when there is one, directly otherwise.
    /// The integration gets a fresh event id.
    pub async fn publish_event(&self, event: Arc<dyn DomainEvent>) -> Result<(), HandlerError> {
        self.publish_recorded(&RecordedEvent::new(event)).await
    }

    /// Like [`Mediator::publish_event`], but the integration carries the id
    /// assigned when the event was recorded.
    pub async fn publish_recorded(&self, event: &RecordedEvent) -> Result<(), HandlerError> {
        let name = event.event().event_name();
        let handlers = self.registry.event_handlers(name);
        debug!(event = name, handlers = handlers.len(), "Publishing event");

        let results = join_all(handlers.iter().map(|h| h.handle_dyn(event.event().as_ref()))).await;
        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                error!(event = name, error = %e, "Event handler failed");
                first_error.get_or_insert(e);
            }
        }

        let payload = match event.event().to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(event = name, error = %e, "Event payload could not be serialized");
                return Err(first_error.unwrap_or(HandlerError::Decode(e)));
            }
        };

        let published = match &self.publisher {
            Some(publisher) => {
                let integration = Integration::from_parts(name, payload.clone(), event.id());
                match publisher.publish_integration(integration, None).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!(event = name, error = %e, "Integration republish failed");
                        first_error.get_or_insert(e);
                        false
                    }
                }
            }
            None => false,
        };

        if !published {
            self.emitter.emit(name, payload).await;
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Publish an entity's pending events sequentially, oldest first.
    ///
    /// On success the buffer is empty. On failure the failed event and every
    /// later one are put back, in order and with their ids, and the error is
    /// returned. A retry therefore republishes under the same dedup keys.
    pub async fn publish_events<T>(&self, entity: &mut T) -> Result<(), HandlerError>
    where
        T: HasDomainEvents + Send,
    {
        let pending = entity.domain_events_mut().drain();
        for (index, event) in pending.iter().enumerate() {
            if let Err(e) = self.publish_recorded(event).await {
                entity.domain_events_mut().restore(pending[index..].to_vec());
                return Err(e);
            }
        }
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(name: &str, data: Value) -> Result<T, ApiError> {
    serde_json::from_value(data)
        .map_err(|e| ApiError::bad_request(format!("Malformed {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandHandler;
    use crate::query::QueryHandler;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use conduit_events::{DomainEvents, EventHandler};
    use conduit_validation::{FieldRules, FieldType, ValidationDescriptor};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Serialize, Deserialize)]
    struct CreateItem {
        name: String,
        version: i64,
    }

    impl Validate for CreateItem {
        fn validation() -> ValidationDescriptor {
            ValidationDescriptor::new()
                .field(FieldRules::for_field("name").required().of_type(FieldType::String).max(10.0))
                .field(FieldRules::for_field("version").required().of_type(FieldType::Number).min(0.0))
        }
    }

    impl Command for CreateItem {
        type Output = String;
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct CountItems {}

    impl Validate for CountItems {
        fn validation() -> ValidationDescriptor {
            ValidationDescriptor::new()
        }
    }

    impl Query for CountItems {
        type Output = usize;
    }

    struct CreateItemHandler {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl CommandHandler<CreateItem> for CreateItemHandler {
        async fn handle(&self, command: CreateItem) -> Result<String, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}@{}", command.name, command.version))
        }
    }

    struct CountItemsHandler;

    #[async_trait]
    impl QueryHandler<CountItems> for CountItemsHandler {
        async fn handle(&self, _query: CountItems) -> Result<usize, HandlerError> {
            Ok(3)
        }
    }

    #[derive(Debug, Clone, Serialize)]
    struct ItemEvent {
        label: String,
        occurred: DateTime<Utc>,
    }

    impl DomainEvent for ItemEvent {
        fn date_time_occurred(&self) -> DateTime<Utc> {
            self.occurred
        }
    }

    fn item_event(label: &str) -> ItemEvent {
        ItemEvent {
            label: label.to_string(),
            occurred: Utc::now(),
        }
    }

    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl EventHandler<ItemEvent> for Recorder {
        async fn handle(&self, event: &ItemEvent) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(event.label.clone());
            if self.fail_on == Some(event.label.as_str()) {
                return Err(HandlerError::failed(format!("refused {}", event.label)));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Item {
        events: DomainEvents,
    }

    impl HasDomainEvents for Item {
        fn domain_events(&self) -> &DomainEvents {
            &self.events
        }

        fn domain_events_mut(&mut self) -> &mut DomainEvents {
            &mut self.events
        }
    }

    fn mediator() -> Mediator {
        Mediator::new(Arc::new(HandlerRegistry::new()), Arc::new(LocalEmitter::new()))
    }

    #[tokio::test]
    async fn test_send_command_dispatches() {
        let mediator = mediator();
        let calls = Arc::new(AtomicU32::new(0));
        mediator
            .registry()
            .register_command::<CreateItem, _>(CreateItemHandler { calls: calls.clone() });

        let output = mediator
            .send_command::<CreateItem>(json!({ "name": "widget", "version": 2 }))
            .await
            .unwrap();
        assert_eq!(output, "widget@2");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_runs_before_dispatch() {
        let mediator = mediator();
        let calls = Arc::new(AtomicU32::new(0));
        mediator
            .registry()
            .register_command::<CreateItem, _>(CreateItemHandler { calls: calls.clone() });

        let err = mediator
            .send_command::<CreateItem>(json!({ "version": 1 }))
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 400);
        let fields: Vec<&String> = err.errors.as_ref().unwrap().keys().collect();
        assert_eq!(fields, vec!["name"]);

        let err = mediator
            .execute_command(CreateItem {
                name: "far too long a name".into(),
                version: -1,
            })
            .await
            .unwrap_err();
        assert_eq!(err.errors.unwrap().len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_handler_is_not_found() {
        let err = mediator().execute_query(CountItems {}).await.unwrap_err();
        assert_eq!(err.status_code, 404);
        assert!(err.message.contains("CountItems"));
    }

    #[tokio::test]
    async fn test_send_query() {
        let mediator = mediator();
        mediator.registry().register_query::<CountItems, _>(CountItemsHandler);
        assert_eq!(mediator.send_query::<CountItems>(json!({})).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_publish_event_runs_every_handler() {
        let mediator = mediator();
        let seen = Arc::new(Mutex::new(Vec::new()));
        mediator.registry().register_event::<ItemEvent, _>(Recorder {
            seen: seen.clone(),
            fail_on: Some("a"),
        });
        mediator.registry().register_event::<ItemEvent, _>(Recorder {
            seen: seen.clone(),
            fail_on: None,
        });
        let mut observer = mediator.emitter().notifications();

        let result = mediator.publish_event(Arc::new(item_event("a"))).await;
        assert!(matches!(result, Err(HandlerError::Failed(_))));
        assert_eq!(seen.lock().unwrap().len(), 2);

        let notification = observer.recv().await.unwrap();
        assert_eq!(notification.topic, "ItemEvent");
        assert_eq!(notification.payload["label"], "a");
    }

    #[tokio::test]
    async fn test_publish_events_in_order_and_drains() {
        let mediator = mediator();
        let seen = Arc::new(Mutex::new(Vec::new()));
        mediator.registry().register_event::<ItemEvent, _>(Recorder {
            seen: seen.clone(),
            fail_on: None,
        });

        let mut item = Item::default();
        for label in ["A", "B", "C"] {
            item.events.add(item_event(label));
        }

        mediator.publish_events(&mut item).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["A", "B", "C"]);
        assert!(item.domain_events().is_empty());
    }

    #[tokio::test]
    async fn test_publish_events_restores_unpublished_tail() {
        let mediator = mediator();
        let seen = Arc::new(Mutex::new(Vec::new()));
        mediator.registry().register_event::<ItemEvent, _>(Recorder {
            seen: seen.clone(),
            fail_on: Some("B"),
        });

        let mut item = Item::default();
        for label in ["A", "B", "C"] {
            item.events.add(item_event(label));
        }

        assert!(mediator.publish_events(&mut item).await.is_err());
        assert_eq!(*seen.lock().unwrap(), vec!["A", "B"]);

        let remaining: Vec<String> = item
            .events
            .drain()
            .iter()
            .map(|e| e.downcast_ref::<ItemEvent>().unwrap().label.clone())
            .collect();
        assert_eq!(remaining, vec!["B", "C"]);
    }

    struct CapturingPublisher {
        emitter: Arc<LocalEmitter>,
        published: Mutex<Vec<Integration>>,
    }

    #[async_trait]
    impl IntegrationPublisher for CapturingPublisher {
        async fn publish_integration(
            &self,
            integration: Integration,
            _topic: Option<&str>,
        ) -> Result<(), HandlerError> {
            self.emitter
                .emit(integration.name(), integration.data().clone())
                .await;
            self.published.lock().unwrap().push(integration);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_attached_publisher_emits_once() {
        let registry = Arc::new(HandlerRegistry::new());
        let emitter = Arc::new(LocalEmitter::new());
        let publisher = Arc::new(CapturingPublisher {
            emitter: emitter.clone(),
            published: Mutex::new(Vec::new()),
        });
        let mediator = Mediator::new(registry, emitter.clone()).with_publisher(publisher.clone());
        let mut observer = emitter.notifications();

        mediator.publish_event(Arc::new(item_event("x"))).await.unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].name(), "ItemEvent");
        assert_eq!(observer.recv().await.unwrap().payload["label"], "x");
        assert!(observer.try_recv().is_err());
    }

    struct DedupingPublisher {
        seen: Mutex<Vec<String>>,
        delivered: AtomicU32,
    }

    #[async_trait]
    impl IntegrationPublisher for DedupingPublisher {
        async fn publish_integration(
            &self,
            integration: Integration,
            _topic: Option<&str>,
        ) -> Result<(), HandlerError> {
            let mut seen = self.seen.lock().unwrap();
            if !seen.contains(&integration.key()) {
                seen.push(integration.key());
                self.delivered.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    struct FailsOnce {
        failed: AtomicU32,
    }

    #[async_trait]
    impl EventHandler<ItemEvent> for FailsOnce {
        async fn handle(&self, _event: &ItemEvent) -> Result<(), HandlerError> {
            if self.failed.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(HandlerError::failed("not yet"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_retry_after_handler_failure_reuses_event_id() {
        let registry = Arc::new(HandlerRegistry::new());
        registry.register_event::<ItemEvent, _>(FailsOnce {
            failed: AtomicU32::new(0),
        });
        let publisher = Arc::new(DedupingPublisher {
            seen: Mutex::new(Vec::new()),
            delivered: AtomicU32::new(0),
        });
        let mediator = Mediator::new(registry, Arc::new(LocalEmitter::new()))
            .with_publisher(publisher.clone());

        let mut item = Item::default();
        item.events.add(item_event("shipped"));

        assert!(mediator.publish_events(&mut item).await.is_err());
        assert_eq!(item.domain_events().len(), 1);

        mediator.publish_events(&mut item).await.unwrap();
        assert!(item.domain_events().is_empty());
        assert_eq!(publisher.delivered.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.seen.lock().unwrap().len(), 1);
    }
}

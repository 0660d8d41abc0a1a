//! Startup wiring for the example service

use std::sync::Arc;

use conduit_cqrs::{HandlerRegistry, Mediator, RegistryError, Registrations};
use conduit_events::LocalEmitter;
use conduit_messaging::{BusConfig, BusError, EventBus};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::contracts::*;
use crate::events::{ExampleCreated, ExampleDeleted, ExampleMetadataUpdated};
use crate::handlers::*;
use crate::notifications::NotificationService;
use crate::repository::ExampleRepository;

/// Errors that stop the service from starting
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Every handler the service registers at startup
pub fn registrations(
    repository: &Arc<ExampleRepository>,
    notifications: &Arc<NotificationService>,
) -> Registrations {
    Registrations::new()
        .command::<CreateExample, _>(CreateExampleHandler {
            repository: repository.clone(),
        })
        .command::<UpdateExample, _>(UpdateExampleHandler {
            repository: repository.clone(),
        })
        .command::<DeleteExample, _>(DeleteExampleHandler {
            repository: repository.clone(),
        })
        .command::<UpdateVersion, _>(UpdateVersionHandler {
            repository: repository.clone(),
        })
        .query::<GetExampleById, _>(GetExampleByIdHandler {
            repository: repository.clone(),
        })
        .query::<GetAllExamples, _>(GetAllExamplesHandler {
            repository: repository.clone(),
        })
        .query::<GetExampleByName, _>(GetExampleByNameHandler {
            repository: repository.clone(),
        })
        .event::<ExampleCreated, _>(ExampleCreatedHandler {
            notifications: notifications.clone(),
        })
        .event::<ExampleDeleted, _>(ExampleDeletedHandler {
            notifications: notifications.clone(),
        })
        .event::<ExampleMetadataUpdated, _>(ExampleMetadataUpdatedHandler::new(
            notifications.clone(),
        ))
}

/// A running example service
pub struct ExampleService {
    pub registry: Arc<HandlerRegistry>,
    pub emitter: Arc<LocalEmitter>,
    pub bus: Arc<EventBus>,
    pub mediator: Arc<Mediator>,
    pub repository: Arc<ExampleRepository>,
    pub notifications: Arc<NotificationService>,
    forwarder: JoinHandle<()>,
}

impl ExampleService {
    /// Connect the bus, register handlers and start consuming.
    ///
    /// Events with a local event handler reach clients through that handler;
    /// anything else emitted locally is forwarded to clients as is.
    pub async fn start(config: &BusConfig) -> Result<Self, ServiceError> {
        let registry = Arc::new(HandlerRegistry::new());
        let emitter = Arc::new(LocalEmitter::new());
        let bus = EventBus::connect(config, registry.clone(), emitter.clone()).await?;

        let mediator = Arc::new(
            Mediator::new(registry.clone(), emitter.clone()).with_publisher(bus.clone()),
        );
        let repository = Arc::new(ExampleRepository::new(mediator.clone()));
        let notifications = Arc::new(NotificationService::new());

        let table = registrations(&repository, &notifications);
        let handlers = table.len();
        table.apply(&registry)?;

        let forward_registry = registry.clone();
        let forwarder = notifications.spawn_forwarder(&emitter, move |topic| {
            forward_registry.event_handlers(topic).is_empty()
        });

        bus.start().await?;
        info!(bus = %bus.kind(), handlers, "Example service started");

        Ok(Self {
            registry,
            emitter,
            bus,
            mediator,
            repository,
            notifications,
            forwarder,
        })
    }

    pub async fn shutdown(self) -> Result<(), ServiceError> {
        self.forwarder.abort();
        self.bus.shutdown().await?;
        info!("Example service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Example;
    use conduit_cqrs::ApiError;
    use serde_json::json;

    async fn service() -> ExampleService {
        ExampleService::start(&BusConfig::default()).await.unwrap()
    }

    async fn create(service: &ExampleService, name: &str) -> Example {
        service
            .mediator
            .send_command::<CreateExample>(json!({
                "name": name,
                "description": "a thing",
                "version": 1
            }))
            .await
            .unwrap()
    }

    #[test]
    fn test_registration_table_is_complete() {
        let mediator = Arc::new(Mediator::new(
            Arc::new(HandlerRegistry::new()),
            Arc::new(LocalEmitter::new()),
        ));
        let repository = Arc::new(ExampleRepository::new(mediator));
        let table = registrations(&repository, &Arc::new(NotificationService::new()));
        assert_eq!(table.len(), 10);

        let registry = HandlerRegistry::new();
        table.apply(&registry).unwrap();
        assert!(registry.has_command_handler("CreateExample"));
        assert!(registry.has_query_handler("GetExampleByName"));
        assert_eq!(registry.event_handlers("ExampleCreated").len(), 1);
    }

    #[tokio::test]
    async fn test_create_then_query() {
        let service = service().await;
        let created = create(&service, "Widget").await;

        let by_id = service
            .mediator
            .send_query::<GetExampleById>(json!({ "id": created.id }))
            .await
            .unwrap();
        assert_eq!(by_id.name, "Widget");

        let by_name = service
            .mediator
            .execute_query(GetExampleByName {
                name: "Widget".into(),
            })
            .await
            .unwrap();
        assert_eq!(by_name.id, created.id);
    }

    #[tokio::test]
    async fn test_create_notifies_clients_once() {
        let service = service().await;
        let mut client = service.notifications.connect("c1");

        create(&service, "Widget").await;

        let first = client.recv().await.unwrap();
        assert_eq!(first.topic, "ExampleCreated");
        tokio::task::yield_now().await;
        assert!(client.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_type_and_metadata() {
        let service = service().await;
        let created = create(&service, "Widget").await;

        let updated = service
            .mediator
            .send_command::<UpdateExample>(json!({
                "id": created.id,
                "type": 1,
                "metadata": { "description": "changed" }
            }))
            .await
            .unwrap();
        assert_eq!(updated.example_type.name(), "Other");
        assert_eq!(updated.metadata.description, "changed");
        assert_eq!(updated.metadata.version, 1.0);

        assert!(
            service
                .mediator
                .execute_command(UpdateVersion {
                    id: created.id.clone(),
                    new_version: 4.0,
                })
                .await
                .unwrap()
        );
        assert_eq!(service.repository.find_by_id(&created.id).unwrap().metadata.version, 4.0);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let service = service().await;
        let err: ApiError = service
            .mediator
            .send_command::<DeleteExample>(json!({ "id": "0b9e8a52-3f4c-4d5e-9a1b-2c3d4e5f6a7b" }))
            .await
            .unwrap_err();
        assert_eq!(err.status_code, ApiError::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_create_is_bad_request() {
        let service = service().await;
        let err = service
            .mediator
            .send_command::<CreateExample>(json!({ "name": "", "version": "one" }))
            .await
            .unwrap_err();
        assert_eq!(err.status_code, ApiError::BAD_REQUEST);
        let fields = err.errors.unwrap();
        assert_eq!(
            fields.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["description", "name", "version"]
        );
        assert!(service.repository.is_empty());
    }
}

//! Command, query and event handlers for the example domain

use std::sync::Arc;

use async_trait::async_trait;
use conduit_cqrs::{CommandHandler, QueryHandler};
use conduit_events::{EventHandler, HandlerError};

use crate::contracts::*;
use crate::domain::{Example, ExampleMetadata, ExampleType, MetadataPatch};
use crate::events::{ExampleCreated, ExampleDeleted, ExampleMetadataUpdated};
use crate::notifications::{EventMapper, NotificationService};
use crate::repository::ExampleRepository;

fn not_found(id: &str) -> HandlerError {
    HandlerError::NotFound(format!("Example {} not found", id))
}

fn load(repository: &ExampleRepository, id: &str) -> Result<Example, HandlerError> {
    repository.find_by_id(id).ok_or_else(|| not_found(id))
}

// ============================================================================
// Commands
// ============================================================================

pub struct CreateExampleHandler {
    pub repository: Arc<ExampleRepository>,
}

#[async_trait]
impl CommandHandler<CreateExample> for CreateExampleHandler {
    async fn handle(&self, command: CreateExample) -> Result<Example, HandlerError> {
        let example_type = match command.example_type.as_deref() {
            None | Some("") => ExampleType::default(),
            Some(name) => ExampleType::from_name(name)
                .ok_or_else(|| HandlerError::failed(format!("Unknown example type {}", name)))?,
        };

        let mut example = Example::new(
            command.name,
            ExampleMetadata::new(command.description, command.version),
            example_type,
        );
        example.create();
        self.repository.insert(&mut example).await;
        Ok(example)
    }
}

pub struct UpdateExampleHandler {
    pub repository: Arc<ExampleRepository>,
}

#[async_trait]
impl CommandHandler<UpdateExample> for UpdateExampleHandler {
    async fn handle(&self, command: UpdateExample) -> Result<Example, HandlerError> {
        let mut example = load(&self.repository, &command.id)?;

        if let Some(name) = command.name {
            example.name = name;
        }
        if let Some(patch) = &command.metadata {
            example.change_metadata(patch);
        }
        if let Some(id) = command.example_type {
            let new_type = ExampleType::from_id(id)
                .ok_or_else(|| HandlerError::failed(format!("Unknown example type {}", id)))?;
            example.change_type(new_type);
        }

        self.repository.update(&mut example).await;
        Ok(example)
    }
}

pub struct DeleteExampleHandler {
    pub repository: Arc<ExampleRepository>,
}

#[async_trait]
impl CommandHandler<DeleteExample> for DeleteExampleHandler {
    async fn handle(&self, command: DeleteExample) -> Result<bool, HandlerError> {
        let mut example = load(&self.repository, &command.id)?;
        example.delete();
        if !self.repository.delete(&mut example).await {
            return Err(not_found(&command.id));
        }
        Ok(true)
    }
}

pub struct UpdateVersionHandler {
    pub repository: Arc<ExampleRepository>,
}

#[async_trait]
impl CommandHandler<UpdateVersion> for UpdateVersionHandler {
    async fn handle(&self, command: UpdateVersion) -> Result<bool, HandlerError> {
        let mut example = load(&self.repository, &command.id)?;
        example.change_metadata(&MetadataPatch::version(command.new_version));
        self.repository.update(&mut example).await;
        Ok(true)
    }
}

// ============================================================================
// Queries
// ============================================================================

pub struct GetExampleByIdHandler {
    pub repository: Arc<ExampleRepository>,
}

#[async_trait]
impl QueryHandler<GetExampleById> for GetExampleByIdHandler {
    async fn handle(&self, query: GetExampleById) -> Result<Example, HandlerError> {
        load(&self.repository, &query.id)
    }
}

pub struct GetAllExamplesHandler {
    pub repository: Arc<ExampleRepository>,
}

#[async_trait]
impl QueryHandler<GetAllExamples> for GetAllExamplesHandler {
    async fn handle(&self, query: GetAllExamples) -> Result<Vec<Example>, HandlerError> {
        let fragment = query.name.as_deref().filter(|name| !name.is_empty());
        Ok(self.repository.search(fragment))
    }
}

pub struct GetExampleByNameHandler {
    pub repository: Arc<ExampleRepository>,
}

#[async_trait]
impl QueryHandler<GetExampleByName> for GetExampleByNameHandler {
    async fn handle(&self, query: GetExampleByName) -> Result<Example, HandlerError> {
        self.repository
            .find_by_name(&query.name)
            .ok_or_else(|| HandlerError::NotFound(format!("Example named {} not found", query.name)))
    }
}

// ============================================================================
// Events
// ============================================================================

/// Pushes created examples to connected clients
pub struct ExampleCreatedHandler {
    pub notifications: Arc<NotificationService>,
}

#[async_trait]
impl EventHandler<ExampleCreated> for ExampleCreatedHandler {
    async fn handle(&self, event: &ExampleCreated) -> Result<(), HandlerError> {
        self.notifications.notify_event(event, None);
        Ok(())
    }
}

pub struct ExampleDeletedHandler {
    pub notifications: Arc<NotificationService>,
}

#[async_trait]
impl EventHandler<ExampleDeleted> for ExampleDeletedHandler {
    async fn handle(&self, event: &ExampleDeleted) -> Result<(), HandlerError> {
        self.notifications.notify_event(event, None);
        Ok(())
    }
}

/// Pushes metadata changes without the timestamp
pub struct ExampleMetadataUpdatedHandler {
    pub notifications: Arc<NotificationService>,
    pub mapper: EventMapper,
}

impl ExampleMetadataUpdatedHandler {
    pub fn new(notifications: Arc<NotificationService>) -> Self {
        Self {
            notifications,
            mapper: EventMapper::new().keep("exampleId").keep("metadata"),
        }
    }
}

#[async_trait]
impl EventHandler<ExampleMetadataUpdated> for ExampleMetadataUpdatedHandler {
    async fn handle(&self, event: &ExampleMetadataUpdated) -> Result<(), HandlerError> {
        self.notifications.notify_event(event, Some(&self.mapper));
        Ok(())
    }
}

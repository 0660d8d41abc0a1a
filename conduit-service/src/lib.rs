//! # Conduit Example Service
//!
//! A small service built on the Conduit stack: an `Example` aggregate, its
//! commands and queries, an in-memory repository that publishes aggregate
//! events after each write, and realtime notifications to connected clients.
//!
//! ```rust
//! use conduit_messaging::BusConfig;
//! use conduit_service::{CreateExample, ExampleService};
//!
//! # tokio_test::block_on(async {
//! let service = ExampleService::start(&BusConfig::default()).await.unwrap();
//! let example = service
//!     .mediator
//!     .execute_command(CreateExample {
//!         name: "Widget".into(),
//!         description: "A widget".into(),
//!         version: 1.0,
//!         example_type: None,
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(service.repository.find_by_id(&example.id).unwrap().name, "Widget");
//! # service.shutdown().await.unwrap();
//! # });
//! ```

pub mod contracts;
pub mod domain;
pub mod events;
pub mod handlers;
pub mod notifications;
pub mod repository;
pub mod service;

pub use contracts::*;
pub use domain::{Example, ExampleMetadata, ExampleType, MetadataPatch};
pub use events::{ExampleCreated, ExampleDeleted, ExampleMetadataUpdated, ExampleTypeChanged};
pub use notifications::{EventMapper, FieldMapping, Notification, NotificationService};
pub use repository::ExampleRepository;
pub use service::{ExampleService, ServiceError, registrations};

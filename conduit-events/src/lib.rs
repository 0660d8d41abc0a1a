//! Events for Conduit services
//!
//! This crate holds the event vocabulary shared by the mediator and the
//! transport bindings:
//!
//! - [`Integration`] - the `{ name, data, eventId }` envelope sent over a broker
//! - [`DomainEvent`] and [`DomainEvents`] - events recorded by an entity and
//!   buffered until published
//! - [`EventHandler`] / [`IntegrationHandler`] - handler traits
//! - [`LocalEmitter`] - in-process fan-out with a broadcast stream for
//!   realtime observers
//! - [`IntegrationPublisher`] - the port the mediator republishes through
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{DateTime, Utc};
//! use conduit_events::*;
//! use serde::Serialize;
//!
//! #[derive(Debug, Clone, Serialize)]
//! struct ItemCreated {
//!     id: String,
//!     occurred: DateTime<Utc>,
//! }
//!
//! impl DomainEvent for ItemCreated {
//!     fn date_time_occurred(&self) -> DateTime<Utc> {
//!         self.occurred
//!     }
//! }
//!
//! let mut pending = DomainEvents::new();
//! pending.add(ItemCreated { id: "x".into(), occurred: Utc::now() });
//! assert_eq!(pending.names(), vec!["ItemCreated"]);
//!
//! let integration = Integration::named("ItemCreated", &serde_json::json!({ "id": "x" })).unwrap();
//! assert!(integration.key().starts_with("ItemCreated:"));
//! ```

pub mod emitter;
pub mod event;
pub mod handler;
pub mod integration;
pub mod publisher;

pub use emitter::{DEFAULT_NOTIFICATION_CAPACITY, LocalEmitter, LocalNotification};
pub use event::{
    AsAny, DomainEvent, DomainEvents, EventPayload, HasDomainEvents, RecordedEvent,
    short_type_name,
};
pub use handler::{
    DynEventHandler, EventHandler, FnHandler, HandlerError, IntegrationHandler, TypedEventHandler,
    handler_fn,
};
pub use integration::Integration;
pub use publisher::IntegrationPublisher;

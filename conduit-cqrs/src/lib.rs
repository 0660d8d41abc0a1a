//! CQRS for Conduit services
//!
//! Commands and queries are typed request objects with a validation
//! descriptor and an associated output type. The [`Mediator`] validates an
//! inbound request, resolves its single handler through the
//! [`HandlerRegistry`] and invokes it. Domain events recorded on an entity are
//! fanned out to event handlers, the local emitter and, optionally, an
//! integration publisher.
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use conduit_cqrs::*;
//! use conduit_events::{HandlerError, LocalEmitter};
//! use conduit_validation::{FieldRules, FieldType, Validate, ValidationDescriptor};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Serialize, Deserialize)]
//! struct CreateUser {
//!     email: String,
//! }
//!
//! impl Validate for CreateUser {
//!     fn validation() -> ValidationDescriptor {
//!         ValidationDescriptor::new()
//!             .field(FieldRules::for_field("email").required().of_type(FieldType::String))
//!     }
//! }
//!
//! impl Command for CreateUser {
//!     type Output = String;
//! }
//!
//! struct CreateUserHandler;
//!
//! #[async_trait]
//! impl CommandHandler<CreateUser> for CreateUserHandler {
//!     async fn handle(&self, command: CreateUser) -> Result<String, HandlerError> {
//!         Ok(format!("user-{}", command.email))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(HandlerRegistry::new());
//! Registrations::new()
//!     .command::<CreateUser, _>(CreateUserHandler)
//!     .apply(&registry)
//!     .unwrap();
//!
//! let mediator = Mediator::new(registry, Arc::new(LocalEmitter::new()));
//! let id = mediator
//!     .send_command::<CreateUser>(serde_json::json!({ "email": "alice@example.com" }))
//!     .await
//!     .unwrap();
//! assert_eq!(id, "user-alice@example.com");
//!
//! let err = mediator
//!     .send_command::<CreateUser>(serde_json::json!({}))
//!     .await
//!     .unwrap_err();
//! assert_eq!(err.status_code, 400);
//! # });
//! ```

pub mod command;
pub mod error;
pub mod mediator;
pub mod query;
pub mod registrations;
pub mod registry;

pub use command::{Command, CommandHandler, ErasedCommandHandler, TypedCommandHandler};
pub use error::{ApiError, RegistryError};
pub use mediator::Mediator;
pub use query::{ErasedQueryHandler, Query, QueryHandler, TypedQueryHandler};
pub use registrations::Registrations;
pub use registry::HandlerRegistry;

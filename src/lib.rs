// Conduit - a transport-agnostic event and integration bus for request-handling
// microservices.
//
// This crate re-exports the workspace members: validation, events, the CQRS
// mediator and registry, and the deduplicating event bus with its bindings.

pub use conduit_cqrs;
pub use conduit_events;
pub use conduit_messaging;
pub use conduit_validation;

#[cfg(feature = "log")]
pub use conduit_log;

// Prelude for common imports
pub mod prelude {
    pub use conduit_cqrs::{
        ApiError, Command, CommandHandler, HandlerRegistry, Mediator, Query, QueryHandler,
        RegistryError, Registrations,
    };
    pub use conduit_events::{
        DomainEvent, DomainEvents, EventHandler, HandlerError, HasDomainEvents, Integration,
        IntegrationHandler, IntegrationPublisher, LocalEmitter, handler_fn,
    };
    pub use conduit_messaging::{BusConfig, BusError, BusType, EventBus, ExpiryMode};
    pub use conduit_validation::{
        FieldRules, FieldType, UUID_PATTERN, Validate, ValidationDescriptor, ValidationError,
        ValidationErrors,
    };
}

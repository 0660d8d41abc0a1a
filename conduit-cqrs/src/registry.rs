//! Handler registry

use crate::command::{Command, CommandHandler, ErasedCommandHandler, TypedCommandHandler};
use crate::query::{ErasedQueryHandler, Query, QueryHandler, TypedQueryHandler};
use conduit_events::{
    DomainEvent, DynEventHandler, EventHandler, IntegrationHandler, TypedEventHandler,
    short_type_name,
};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// In-memory directory from names to handlers.
///
/// Command and query names map to a single handler; registering again
/// replaces the previous one. Event and integration names map to lists that
/// only grow.
#[derive(Default)]
pub struct HandlerRegistry {
    commands: DashMap<String, Arc<dyn ErasedCommandHandler>>,
    queries: DashMap<String, Arc<dyn ErasedQueryHandler>>,
    events: DashMap<String, Vec<Arc<dyn DynEventHandler>>>,
    integrations: DashMap<String, Vec<Arc<dyn IntegrationHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command_handler(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn ErasedCommandHandler>,
    ) {
        let name = name.into();
        if self.commands.insert(name.clone(), handler).is_some() {
            warn!(command = %name, "Command handler replaced");
        } else {
            debug!(command = %name, "Command handler registered");
        }
    }

    pub fn register_query_handler(&self, name: impl Into<String>, handler: Arc<dyn ErasedQueryHandler>) {
        let name = name.into();
        if self.queries.insert(name.clone(), handler).is_some() {
            warn!(query = %name, "Query handler replaced");
        } else {
            debug!(query = %name, "Query handler registered");
        }
    }

    pub fn register_event_handler(&self, name: impl Into<String>, handler: Arc<dyn DynEventHandler>) {
        let name = name.into();
        debug!(event = %name, "Event handler registered");
        self.events.entry(name).or_default().push(handler);
    }

    pub fn register_integration(&self, topic: impl Into<String>, handler: Arc<dyn IntegrationHandler>) {
        let topic = topic.into();
        debug!(topic = %topic, "Integration handler registered");
        self.integrations.entry(topic).or_default().push(handler);
    }

    /// Register a typed command handler under `C::name()`
    pub fn register_command<C, H>(&self, handler: H)
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        self.register_command_handler(C::name(), Arc::new(TypedCommandHandler::new(handler)));
    }

    /// Register a typed query handler under `Q::name()`
    pub fn register_query<Q, H>(&self, handler: H)
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        self.register_query_handler(Q::name(), Arc::new(TypedQueryHandler::new(handler)));
    }

    /// Register a typed event handler under the event's short type name.
    ///
    /// Events that override [`DomainEvent::event_name`] must be registered
    /// with [`HandlerRegistry::register_event_handler`] under that name.
    pub fn register_event<E, H>(&self, handler: H)
    where
        E: DomainEvent,
        H: EventHandler<E> + 'static,
    {
        self.register_event_handler(short_type_name::<E>(), Arc::new(TypedEventHandler::new(handler)));
    }

    pub fn command_handler(&self, name: &str) -> Option<Arc<dyn ErasedCommandHandler>> {
        self.commands.get(name).map(|h| h.value().clone())
    }

    pub fn query_handler(&self, name: &str) -> Option<Arc<dyn ErasedQueryHandler>> {
        self.queries.get(name).map(|h| h.value().clone())
    }

    pub fn has_command_handler(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn has_query_handler(&self, name: &str) -> bool {
        self.queries.contains_key(name)
    }

    pub fn event_handlers(&self, name: &str) -> Vec<Arc<dyn DynEventHandler>> {
        self.events.get(name).map(|h| h.value().clone()).unwrap_or_default()
    }

    pub fn integration_handlers(&self, topic: &str) -> Vec<Arc<dyn IntegrationHandler>> {
        self.integrations
            .get(topic)
            .map(|h| h.value().clone())
            .unwrap_or_default()
    }

    /// Every topic with at least one integration handler, sorted
    pub fn integration_handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .integrations
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}

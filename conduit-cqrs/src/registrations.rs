//! Startup registration table

use crate::command::{Command, CommandHandler, ErasedCommandHandler, TypedCommandHandler};
use crate::error::RegistryError;
use crate::query::{ErasedQueryHandler, Query, QueryHandler, TypedQueryHandler};
use crate::registry::HandlerRegistry;
use conduit_events::{
    DomainEvent, DynEventHandler, EventHandler, IntegrationHandler, TypedEventHandler,
    short_type_name,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

enum Entry {
    Command(String, Arc<dyn ErasedCommandHandler>),
    Query(String, Arc<dyn ErasedQueryHandler>),
    Event(String, Arc<dyn DynEventHandler>),
    Integration(String, Arc<dyn IntegrationHandler>),
}

/// Enumerable list of every handler a service wires up at startup.
///
/// Unlike direct registry calls, a table containing two command (or query)
/// handlers under one name is rejected as a whole by [`Registrations::apply`].
///
/// ```rust,ignore
/// Registrations::new()
///     .command::<CreateExample, _>(CreateExampleHandler::new(repo.clone()))
///     .query::<GetExampleById, _>(GetExampleByIdHandler::new(repo.clone()))
///     .event::<ExampleCreated, _>(ExampleNotifier::new(notifications.clone()))
///     .apply(&registry)?;
/// ```
#[derive(Default)]
pub struct Registrations {
    entries: Vec<Entry>,
}

impl Registrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command<C, H>(mut self, handler: H) -> Self
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        self.entries.push(Entry::Command(
            C::name().to_string(),
            Arc::new(TypedCommandHandler::new(handler)),
        ));
        self
    }

    pub fn query<Q, H>(mut self, handler: H) -> Self
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        self.entries.push(Entry::Query(
            Q::name().to_string(),
            Arc::new(TypedQueryHandler::new(handler)),
        ));
        self
    }

    pub fn event<E, H>(mut self, handler: H) -> Self
    where
        E: DomainEvent,
        H: EventHandler<E> + 'static,
    {
        self.entries.push(Entry::Event(
            short_type_name::<E>().to_string(),
            Arc::new(TypedEventHandler::new(handler)),
        ));
        self
    }

    pub fn integration(mut self, topic: impl Into<String>, handler: Arc<dyn IntegrationHandler>) -> Self {
        self.entries.push(Entry::Integration(topic.into(), handler));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(kind, name)` for every entry, in table order
    pub fn describe(&self) -> Vec<(&'static str, &str)> {
        self.entries
            .iter()
            .map(|entry| match entry {
                Entry::Command(name, _) => ("command", name.as_str()),
                Entry::Query(name, _) => ("query", name.as_str()),
                Entry::Event(name, _) => ("event", name.as_str()),
                Entry::Integration(name, _) => ("integration", name.as_str()),
            })
            .collect()
    }

    fn check(&self, registry: &HandlerRegistry) -> Result<(), RegistryError> {
        let mut commands = HashSet::new();
        let mut queries = HashSet::new();
        for entry in &self.entries {
            match entry {
                Entry::Command(name, _) => {
                    if !commands.insert(name.as_str()) || registry.has_command_handler(name) {
                        return Err(RegistryError::DuplicateCommand(name.clone()));
                    }
                }
                Entry::Query(name, _) => {
                    if !queries.insert(name.as_str()) || registry.has_query_handler(name) {
                        return Err(RegistryError::DuplicateQuery(name.clone()));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Install every entry into `registry`.
    ///
    /// Nothing is registered when the table is rejected.
    pub fn apply(self, registry: &HandlerRegistry) -> Result<(), RegistryError> {
        self.check(registry)?;

        let total = self.entries.len();
        for entry in self.entries {
            match entry {
                Entry::Command(name, handler) => registry.register_command_handler(name, handler),
                Entry::Query(name, handler) => registry.register_query_handler(name, handler),
                Entry::Event(name, handler) => registry.register_event_handler(name, handler),
                Entry::Integration(topic, handler) => registry.register_integration(topic, handler),
            }
        }
        info!(handlers = total, "Handler registrations applied");
        Ok(())
    }
}

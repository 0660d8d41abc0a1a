//! Domain event definitions and the per-entity event buffer

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

/// Short name of a type: the path segment before any generic arguments.
///
/// `my_app::events::ItemCreated` becomes `ItemCreated`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    short_name(std::any::type_name::<T>())
}

pub(crate) fn short_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Cast to Any for downcasting
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// JSON form of an event, used for local fan-out and integration republish.
pub trait EventPayload {
    fn to_payload(&self) -> Result<Value, serde_json::Error>;
}

impl<T: Serialize> EventPayload for T {
    fn to_payload(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Domain event trait
///
/// Implemented by the events an aggregate records from its behaviour methods.
/// The event name defaults to the short type name, which is also the name
/// event handlers are registered under.
pub trait DomainEvent: AsAny + EventPayload + Send + Sync + Debug + 'static {
    /// Get event name
    fn event_name(&self) -> &'static str {
        short_name(std::any::type_name_of_val(self))
    }

    /// When the event happened
    fn date_time_occurred(&self) -> DateTime<Utc>;
}

impl dyn DomainEvent {
    /// Downcast to a concrete event type
    pub fn downcast_ref<E: DomainEvent>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }
}

/// An event taken from an entity buffer, with the id assigned when it was
/// recorded. The id becomes the integration `eventId`, so republishing a
/// restored event reuses its dedup key.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    id: String,
    event: Arc<dyn DomainEvent>,
}

impl RecordedEvent {
    /// Record `event` under a fresh id
    pub fn new(event: Arc<dyn DomainEvent>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), event)
    }

    pub fn with_id(id: impl Into<String>, event: Arc<dyn DomainEvent>) -> Self {
        Self {
            id: id.into(),
            event,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event(&self) -> &Arc<dyn DomainEvent> {
        &self.event
    }
}

impl Deref for RecordedEvent {
    type Target = dyn DomainEvent;

    fn deref(&self) -> &Self::Target {
        self.event.as_ref()
    }
}

/// Ordered buffer of events recorded by an entity and not yet published.
#[derive(Debug, Clone, Default)]
pub struct DomainEvents {
    pending: VecDeque<RecordedEvent>,
}

impl DomainEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event at the end of the buffer
    pub fn add<E: DomainEvent>(&mut self, event: E) {
        self.pending.push_back(RecordedEvent::new(Arc::new(event)));
    }

    /// Take every pending event, oldest first, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<RecordedEvent> {
        self.pending.drain(..).collect()
    }

    /// Put events back at the front of the buffer, keeping their order and ids
    pub fn restore(&mut self, events: Vec<RecordedEvent>) {
        for event in events.into_iter().rev() {
            self.pending.push_front(event);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Names of pending events in publish order
    pub fn names(&self) -> Vec<&'static str> {
        self.pending.iter().map(|e| e.event_name()).collect()
    }
}

/// Entity that buffers domain events until they are published.
pub trait HasDomainEvents {
    fn domain_events(&self) -> &DomainEvents;

    fn domain_events_mut(&mut self) -> &mut DomainEvents;
}

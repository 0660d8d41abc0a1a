//! Handler traits for domain events and integrations

use crate::event::DomainEvent;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;

/// Handler error
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Integration publish failed: {0}")]
    Publish(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Typed domain event handler
#[async_trait]
pub trait EventHandler<E: DomainEvent>: Send + Sync {
    /// Handle the event
    async fn handle(&self, event: &E) -> Result<(), HandlerError>;
}

/// Type-erased domain event handler
#[async_trait]
pub trait DynEventHandler: Send + Sync {
    /// Handle event (type-erased)
    async fn handle_dyn(&self, event: &dyn DomainEvent) -> Result<(), HandlerError>;
}

/// Wrapper for typed event handlers
pub struct TypedEventHandler<E: DomainEvent, H: EventHandler<E>> {
    handler: H,
    _phantom: PhantomData<fn(E)>,
}

impl<E: DomainEvent, H: EventHandler<E>> TypedEventHandler<E, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<E: DomainEvent, H: EventHandler<E>> DynEventHandler for TypedEventHandler<E, H> {
    async fn handle_dyn(&self, event: &dyn DomainEvent) -> Result<(), HandlerError> {
        match event.downcast_ref::<E>() {
            Some(typed_event) => self.handler.handle(typed_event).await,
            None => Err(HandlerError::failed(format!(
                "Type mismatch: handler does not accept {}",
                event.event_name()
            ))),
        }
    }
}

/// Handler for integration payloads and local notifications.
///
/// Receives the envelope's `data`; the envelope name selects the handler.
#[async_trait]
pub trait IntegrationHandler: Send + Sync {
    async fn handle(&self, data: &Value) -> Result<(), HandlerError>;
}

/// Integration handler backed by an async closure
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as an [`IntegrationHandler`].
///
/// ```
/// use conduit_events::{handler_fn, HandlerError};
///
/// let handler = handler_fn(|data| async move {
///     tracing::info!(%data, "received");
///     Ok::<_, HandlerError>(())
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> IntegrationHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, data: &Value) -> Result<(), HandlerError> {
        (self.f)(data.clone()).await
    }
}

//! The seam between the bus front and a concrete binding

use std::sync::Arc;

use async_trait::async_trait;
use conduit_cqrs::HandlerRegistry;
use conduit_events::{Integration, IntegrationHandler, LocalEmitter};

use crate::config::{BusConfig, BusType};
use crate::dedup::DedupWindow;
use crate::dispatch::InboundDispatcher;
use crate::error::BusError;

/// A concrete binding. The bus front owns deduplication; a transport only
/// moves envelopes and feeds inbound ones to the [`InboundDispatcher`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which binding this is
    fn kind(&self) -> BusType;

    /// Ensure a destination exists for every registered integration topic,
    /// then start consuming
    async fn start(&self) -> Result<(), BusError>;

    /// Send `integration` to `topic` and emit it to the local fan-out
    async fn deliver(&self, integration: &Integration, topic: &str) -> Result<(), BusError>;

    /// Attach a handler for messages arriving on `topic`
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn IntegrationHandler>,
    ) -> Result<(), BusError>;

    /// Detach from `topic`; warns rather than fails when not subscribed
    async fn unsubscribe(&self, topic: &str) -> Result<(), BusError>;

    /// Cancel consumers and close connections
    async fn shutdown(&self) -> Result<(), BusError>;
}

/// Shared state handed to every binding
#[derive(Clone)]
pub struct TransportContext {
    pub registry: Arc<HandlerRegistry>,
    pub emitter: Arc<LocalEmitter>,
    pub window: Arc<DedupWindow>,
    pub dispatcher: Arc<InboundDispatcher>,
    pub environment: String,
}

impl TransportContext {
    pub fn new(config: &BusConfig, registry: Arc<HandlerRegistry>, emitter: Arc<LocalEmitter>) -> Self {
        let window = Arc::new(DedupWindow::new(config.dedup_ttl, config.dedup_mode));
        let dispatcher = Arc::new(InboundDispatcher::new(
            registry.clone(),
            emitter.clone(),
            window.clone(),
            config.dedup_ttl,
            config.dedup_mode,
        ));
        Self {
            registry,
            emitter,
            window,
            dispatcher,
            environment: config.environment.clone(),
        }
    }

    /// Emit an envelope's payload under its name
    pub async fn emit_local(&self, integration: &Integration) {
        self.emitter
            .emit(integration.name(), integration.data().clone())
            .await;
    }
}

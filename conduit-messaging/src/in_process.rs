//! In-process binding over the local emitter

use std::sync::Arc;

use async_trait::async_trait;
use conduit_events::{Integration, IntegrationHandler};
use futures_util::future::join_all;
use tracing::{debug, error, warn};

use crate::config::BusType;
use crate::error::BusError;
use crate::transport::{Transport, TransportContext};

/// Delivers within the process. Nothing is serialized; registry integration
/// handlers and the handler subscribed to the topic run inside `deliver`,
/// then the payload is emitted locally under the envelope name.
pub struct InProcessTransport {
    ctx: TransportContext,
}

impl InProcessTransport {
    pub fn new(ctx: TransportContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    fn kind(&self) -> BusType {
        BusType::InProcess
    }

    async fn start(&self) -> Result<(), BusError> {
        Ok(())
    }

    async fn deliver(&self, integration: &Integration, topic: &str) -> Result<(), BusError> {
        let mut handlers = self.ctx.registry.integration_handlers(integration.name());
        handlers.extend(self.ctx.dispatcher.subscription(topic));
        let results = join_all(handlers.iter().map(|h| h.handle(integration.data()))).await;
        for e in results.into_iter().filter_map(Result::err) {
            error!(
                topic = %topic,
                event_id = %integration.event_id(),
                error = %e,
                "Integration handler failed"
            );
        }

        self.ctx.emit_local(integration).await;
        debug!(topic = %topic, name = %integration.name(), "Integration delivered in process");
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn IntegrationHandler>,
    ) -> Result<(), BusError> {
        if self.ctx.dispatcher.add_subscription(topic, handler) {
            debug!(topic = %topic, "Subscribed in process");
        }
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), BusError> {
        if self.ctx.dispatcher.remove_subscription(topic).is_none() {
            warn!(topic = %topic, "No subscription to remove");
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BusError> {
        Ok(())
    }
}

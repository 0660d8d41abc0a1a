//! Inbound message handling shared by every binding

use std::sync::Arc;
use std::time::Duration;

use conduit_cqrs::HandlerRegistry;
use conduit_events::{Integration, IntegrationHandler, LocalEmitter};
use dashmap::DashMap;
use futures_util::future::join_all;
use tracing::{debug, error, warn};

use crate::dedup::{DedupWindow, ExpiryMode};

/// What the binding should tell the broker about a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Every handler succeeded, or the message was already processed
    Ack,
    /// A handler failed; redeliver
    Requeue,
    /// The body is not an integration; drop without redelivery
    Reject,
}

/// Decodes inbound bodies and runs their handlers.
///
/// Handlers for a message are the registry's integration handlers for the
/// envelope name plus the handler subscribed to the destination topic. They
/// run concurrently and the message is acknowledged only if all succeed.
pub struct InboundDispatcher {
    registry: Arc<HandlerRegistry>,
    emitter: Arc<LocalEmitter>,
    published: Arc<DedupWindow>,
    consumed: DedupWindow,
    subscriptions: DashMap<String, Arc<dyn IntegrationHandler>>,
}

impl InboundDispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        emitter: Arc<LocalEmitter>,
        published: Arc<DedupWindow>,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> Self {
        Self {
            registry,
            emitter,
            published,
            consumed: DedupWindow::new(ttl, mode),
            subscriptions: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn emitter(&self) -> &Arc<LocalEmitter> {
        &self.emitter
    }

    /// Attach the subscribe handler for `topic`. The first handler stays;
    /// returns false when one was already attached.
    pub fn add_subscription(&self, topic: &str, handler: Arc<dyn IntegrationHandler>) -> bool {
        match self.subscriptions.entry(topic.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                warn!(topic = %topic, "Already subscribed to topic");
                false
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(handler);
                true
            }
        }
    }

    pub fn remove_subscription(&self, topic: &str) -> Option<Arc<dyn IntegrationHandler>> {
        self.subscriptions.remove(topic).map(|(_, handler)| handler)
    }

    /// Handler attached to `topic` by `subscribe`, if any
    pub fn subscription(&self, topic: &str) -> Option<Arc<dyn IntegrationHandler>> {
        self.subscriptions.get(topic).map(|h| h.value().clone())
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.contains_key(topic)
    }

    /// Expire consumed keys
    pub fn sweep(&self) -> usize {
        self.consumed.sweep()
    }

    /// Handle one raw message received on `topic`.
    pub async fn dispatch(&self, topic: &str, body: &[u8]) -> Disposition {
        let integration = match Integration::from_slice(body) {
            Ok(integration) => integration,
            Err(e) => {
                error!(topic = %topic, error = %e, "Undecodable message rejected");
                return Disposition::Reject;
            }
        };
        self.dispatch_integration(topic, integration).await
    }

    /// Handle one decoded integration received on `topic`.
    pub async fn dispatch_integration(&self, topic: &str, integration: Integration) -> Disposition {
        let key = integration.key();
        if self.consumed.is_processed(&key) {
            debug!(topic = %topic, event_id = %integration.event_id(), "Redelivered message already processed");
            return Disposition::Ack;
        }

        debug!(
            topic = %topic,
            name = %integration.name(),
            event_id = %integration.event_id(),
            "Received integration"
        );

        let mut handlers = self.registry.integration_handlers(integration.name());
        handlers.extend(self.subscription(topic));

        let results = join_all(handlers.iter().map(|h| h.handle(integration.data()))).await;
        let failures = results.iter().filter(|r| r.is_err()).count();
        for e in results.into_iter().filter_map(Result::err) {
            error!(
                topic = %topic,
                event_id = %integration.event_id(),
                error = %e,
                "Integration handler failed"
            );
        }
        if failures > 0 {
            return Disposition::Requeue;
        }

        self.consumed.record(&key);
        // The publishing side of this process already emitted it.
        if !self.published.is_seen(&key) {
            let name = integration.name().to_string();
            self.emitter.emit(&name, integration.into_data()).await;
        }
        Disposition::Ack
    }
}

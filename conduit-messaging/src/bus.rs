//! Event bus front: deduplicated publish over a pluggable transport

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use conduit_cqrs::HandlerRegistry;
use conduit_events::{HandlerError, Integration, IntegrationHandler, IntegrationPublisher, LocalEmitter};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::{BusConfig, BusType};
use crate::dedup::{DedupWindow, Reservation};
use crate::dispatch::InboundDispatcher;
use crate::error::BusError;
use crate::in_process::InProcessTransport;
use crate::transport::{Transport, TransportContext};

/// Transport-agnostic publish/subscribe front.
///
/// `publish` delivers each `name:eventId` at most once per window; the binding
/// behind it is chosen by [`EventBus::connect`].
pub struct EventBus {
    transport: Arc<dyn Transport>,
    window: Arc<DedupWindow>,
    dispatcher: Arc<InboundDispatcher>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Build the binding selected by `config` and connect it.
    ///
    /// Connection failures are returned and should be treated as fatal.
    pub async fn connect(
        config: &BusConfig,
        registry: Arc<HandlerRegistry>,
        emitter: Arc<LocalEmitter>,
    ) -> Result<Arc<Self>, BusError> {
        config.validate()?;
        let ctx = TransportContext::new(config, registry, emitter);

        let transport: Arc<dyn Transport> = match config.bus_type {
            BusType::InProcess => Arc::new(InProcessTransport::new(ctx.clone())),
            #[cfg(feature = "rabbitmq")]
            BusType::RabbitMq => {
                Arc::new(crate::rabbitmq::RabbitMqTransport::connect(config, ctx.clone()).await?)
            }
            #[cfg(feature = "redis")]
            BusType::Redis => Arc::new(crate::redis::RedisTransport::connect(config, ctx.clone()).await?),
            #[cfg(feature = "pubsub")]
            BusType::GooglePubSub => {
                Arc::new(crate::pubsub::PubSubTransport::connect(config, ctx.clone()).await?)
            }
            #[allow(unreachable_patterns)]
            other => {
                return Err(BusError::Configuration(format!(
                    "{} binding is not compiled in; enable its cargo feature",
                    other
                )));
            }
        };

        info!(bus = %config.bus_type, environment = %config.environment, "Event bus connected");
        Ok(Arc::new(Self::new(transport, &ctx, config.dedup_ttl)))
    }

    /// Wrap an already-built transport. Spawns the window sweeper, so this
    /// must run inside a tokio runtime.
    pub fn new(transport: Arc<dyn Transport>, ctx: &TransportContext, sweep_every: Duration) -> Self {
        let sweeper = spawn_sweeper(
            Arc::downgrade(&ctx.window),
            Arc::downgrade(&ctx.dispatcher),
            sweep_every,
        );
        Self {
            transport,
            window: ctx.window.clone(),
            dispatcher: ctx.dispatcher.clone(),
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    pub fn kind(&self) -> BusType {
        self.transport.kind()
    }

    /// Provision destinations for registered integration topics and consume
    pub async fn start(&self) -> Result<(), BusError> {
        self.transport.start().await?;
        info!(bus = %self.kind(), "Event bus started");
        Ok(())
    }

    /// Publish `integration` to `topic`, or to its name when `topic` is `None`.
    ///
    /// A key already processed, or being published concurrently, is a no-op
    /// success. A failed delivery leaves the key unrecorded.
    pub async fn publish(&self, integration: &Integration, topic: Option<&str>) -> Result<(), BusError> {
        let key = integration.key();
        let guard = match self.window.reserve(&key) {
            Reservation::Acquired(guard) => guard,
            Reservation::Processed | Reservation::InFlight => {
                debug!(key = %key, "Skipping duplicate event");
                return Ok(());
            }
        };

        let topic = topic.unwrap_or(integration.name());
        match self.transport.deliver(integration, topic).await {
            Ok(()) => {
                guard.commit();
                debug!(topic = %topic, event_id = %integration.event_id(), "Integration published");
                Ok(())
            }
            Err(e) => {
                error!(
                    topic = %topic,
                    event_id = %integration.event_id(),
                    error = %e,
                    "Failed to publish integration"
                );
                Err(e)
            }
        }
    }

    pub async fn subscribe(&self, topic: &str, handler: Arc<dyn IntegrationHandler>) -> Result<(), BusError> {
        self.transport.subscribe(topic, handler).await
    }

    pub async fn unsubscribe(&self, topic: &str) -> Result<(), BusError> {
        self.transport.unsubscribe(topic).await
    }

    /// Stop the sweeper and shut the transport down
    pub async fn shutdown(&self) -> Result<(), BusError> {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
        self.transport.shutdown().await?;
        info!(bus = %self.kind(), "Event bus shut down");
        Ok(())
    }

    /// Whether `key` (`name:eventId`) is in the processed window
    pub fn is_processed(&self, key: &str) -> bool {
        self.window.is_processed(key)
    }

    pub fn window(&self) -> &Arc<DedupWindow> {
        &self.window
    }

    pub fn dispatcher(&self) -> &Arc<InboundDispatcher> {
        &self.dispatcher
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.abort();
        }
    }
}

#[async_trait]
impl IntegrationPublisher for EventBus {
    async fn publish_integration(
        &self,
        integration: Integration,
        topic: Option<&str>,
    ) -> Result<(), HandlerError> {
        self.publish(&integration, topic).await.map_err(HandlerError::from)
    }
}

fn spawn_sweeper(
    window: Weak<DedupWindow>,
    dispatcher: Weak<InboundDispatcher>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let (Some(window), Some(dispatcher)) = (window.upgrade(), dispatcher.upgrade()) else {
                break;
            };
            let published = window.sweep();
            let consumed = dispatcher.sweep();
            debug!(published, consumed, "Cleared processed events cache");
        }
    })
}

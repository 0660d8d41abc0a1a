//! Redis binding

use std::sync::Arc;

use async_trait::async_trait;
use conduit_events::{Integration, IntegrationHandler};
use dashmap::DashSet;
use futures_util::StreamExt;
use parking_lot::Mutex;
use redis::Client;
use redis::aio::{MultiplexedConnection, PubSubSink, PubSubStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{BusConfig, BusType};
use crate::dispatch::{Disposition, InboundDispatcher};
use crate::error::BusError;
use crate::transport::{Transport, TransportContext};

/// Channel binding. Publishes over a multiplexed connection and reads every
/// subscribed channel from one dedicated pub/sub connection.
///
/// Redis has no acknowledgement, so a failed handler is logged and the message
/// is gone.
pub struct RedisTransport {
    ctx: TransportContext,
    publisher: Mutex<Option<MultiplexedConnection>>,
    sink: tokio::sync::Mutex<Option<PubSubSink>>,
    channels: DashSet<String>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl RedisTransport {
    pub async fn connect(config: &BusConfig, ctx: TransportContext) -> Result<Self, BusError> {
        info!(url = %config.redis_url, "Connecting to Redis");

        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| BusError::Configuration(e.to_string()))?;
        let publisher = client.get_multiplexed_async_connection().await?;
        let (sink, stream) = client.get_async_pubsub().await?.split();

        let reader = tokio::spawn(read_messages(stream, ctx.dispatcher.clone()));

        info!("Connected to Redis successfully");

        Ok(Self {
            ctx,
            publisher: Mutex::new(Some(publisher)),
            sink: tokio::sync::Mutex::new(Some(sink)),
            channels: DashSet::new(),
            reader: Mutex::new(Some(reader)),
        })
    }

    async fn listen(&self, channel: &str) -> Result<(), BusError> {
        if !self.channels.insert(channel.to_string()) {
            return Ok(());
        }

        let mut sink = self.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            self.channels.remove(channel);
            return Err(closed());
        };
        if let Err(e) = sink.subscribe(channel).await {
            self.channels.remove(channel);
            return Err(BusError::Subscribe(e.to_string()));
        }
        info!(channel = channel, "Subscribed to Redis channel");
        Ok(())
    }
}

fn closed() -> BusError {
    BusError::ChannelClosed("Redis connection already shut down".into())
}

/// Remove every tracked channel, in a stable order
fn take_channels(channels: &DashSet<String>) -> Vec<String> {
    let mut taken: Vec<String> = channels.iter().map(|c| c.key().clone()).collect();
    taken.sort();
    for channel in &taken {
        channels.remove(channel);
    }
    taken
}

#[async_trait]
impl Transport for RedisTransport {
    fn kind(&self) -> BusType {
        BusType::Redis
    }

    async fn start(&self) -> Result<(), BusError> {
        for topic in self.ctx.registry.integration_handler_names() {
            self.listen(&topic).await?;
        }
        Ok(())
    }

    async fn deliver(&self, integration: &Integration, topic: &str) -> Result<(), BusError> {
        let payload = integration.to_bytes()?;
        let mut conn = self.publisher.lock().clone().ok_or_else(closed)?;

        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(topic)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;

        debug!(channel = topic, receivers = receivers, "Published message");

        self.ctx.emit_local(integration).await;
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn IntegrationHandler>,
    ) -> Result<(), BusError> {
        if self.ctx.dispatcher.add_subscription(topic, handler) {
            self.listen(topic).await?;
        }
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), BusError> {
        if self.ctx.dispatcher.remove_subscription(topic).is_none() {
            warn!(channel = topic, "No subscription to remove");
            return Ok(());
        }
        // Registry handlers still listen on their own channels.
        if !self.ctx.registry.integration_handlers(topic).is_empty() {
            return Ok(());
        }
        self.channels.remove(topic);
        let mut sink = self.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return Ok(());
        };
        sink.unsubscribe(topic)
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;
        info!(channel = topic, "Unsubscribed from Redis channel");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BusError> {
        info!("Closing Redis connections");

        let channels = take_channels(&self.channels);
        if let Some(mut sink) = self.sink.lock().await.take() {
            for channel in &channels {
                if let Err(e) = sink.unsubscribe(channel.as_str()).await {
                    warn!(channel = %channel, error = %e, "Failed to unsubscribe during shutdown");
                }
            }
            drop(sink);
        }

        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.publisher.lock().take();

        info!(channels = channels.len(), "Redis connections closed");
        Ok(())
    }
}

impl Drop for RedisTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

async fn read_messages(mut stream: PubSubStream, dispatcher: Arc<InboundDispatcher>) {
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name().to_string();
        match dispatcher.dispatch(&channel, msg.get_payload_bytes()).await {
            Disposition::Ack => {}
            Disposition::Requeue => {
                error!(channel = %channel, "Handler failed; message dropped");
            }
            Disposition::Reject => {
                warn!(channel = %channel, "Undecodable message dropped");
            }
        }
    }
    debug!("Redis pub/sub stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_cqrs::HandlerRegistry;
    use conduit_events::LocalEmitter;

    #[test]
    fn test_take_channels_empties_the_set() {
        let channels = DashSet::new();
        channels.insert("orders".to_string());
        channels.insert("ItemCreated".to_string());

        assert_eq!(take_channels(&channels), vec!["ItemCreated", "orders"]);
        assert!(channels.is_empty());
        assert!(take_channels(&channels).is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_url_is_configuration_error() {
        let config = BusConfig::new(BusType::Redis).with_redis_url("not a url");
        let ctx = TransportContext::new(
            &config,
            Arc::new(HandlerRegistry::new()),
            Arc::new(LocalEmitter::new()),
        );

        let result = RedisTransport::connect(&config, ctx).await;
        assert!(matches!(result, Err(BusError::Configuration(_))));
    }
}

//! RabbitMQ binding

use std::sync::Arc;

use async_trait::async_trait;
use conduit_events::{Integration, IntegrationHandler};
use dashmap::{DashMap, DashSet};
use futures_util::StreamExt;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, options::*,
    types::FieldTable,
};
use tracing::{debug, error, info, warn};

use crate::config::{BusConfig, BusType};
use crate::dispatch::{Disposition, InboundDispatcher};
use crate::error::BusError;
use crate::transport::{Transport, TransportContext};

/// Consumer tag for `topic` in `environment`
pub fn consumer_tag(topic: &str, environment: &str) -> String {
    format!("{}-consumer-{}", topic, environment)
}

/// Properties for a persistent JSON envelope
pub fn publish_properties(integration: &Integration) -> BasicProperties {
    BasicProperties::default()
        .with_delivery_mode(2)
        .with_content_type("application/json".into())
        .with_message_id(integration.event_id().to_string().into())
}

fn durable() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

struct ActiveConsumer {
    channel: Channel,
    tag: String,
}

/// Durable-queue binding. One confirm-mode channel publishes; each consumed
/// queue gets its own channel.
pub struct RabbitMqTransport {
    ctx: TransportContext,
    connection: Connection,
    publish_channel: Channel,
    declared: DashSet<String>,
    consumers: DashMap<String, ActiveConsumer>,
    prefetch: Option<u16>,
}

impl RabbitMqTransport {
    pub async fn connect(config: &BusConfig, ctx: TransportContext) -> Result<Self, BusError> {
        info!(url = %config.rabbitmq_url, "Connecting to RabbitMQ");

        let connection =
            Connection::connect(&config.rabbitmq_url, ConnectionProperties::default()).await?;
        let publish_channel = connection.create_channel().await?;
        publish_channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        info!("Connected to RabbitMQ successfully");

        Ok(Self {
            ctx,
            connection,
            publish_channel,
            declared: DashSet::new(),
            consumers: DashMap::new(),
            prefetch: config.prefetch,
        })
    }

    async fn declare(&self, queue: &str) -> Result<(), BusError> {
        if self.declared.contains(queue) {
            return Ok(());
        }
        self.publish_channel
            .queue_declare(queue, durable(), FieldTable::default())
            .await?;
        self.declared.insert(queue.to_string());
        debug!(queue = queue, "Queue declared");
        Ok(())
    }

    /// Start a consumer on `topic` unless one is already running
    async fn consume(&self, topic: &str) -> Result<(), BusError> {
        if self.consumers.contains_key(topic) {
            return Ok(());
        }

        let channel = self.connection.create_channel().await?;
        if let Some(prefetch) = self.prefetch {
            channel
                .basic_qos(prefetch, BasicQosOptions::default())
                .await?;
        }
        channel
            .queue_declare(topic, durable(), FieldTable::default())
            .await?;

        let tag = consumer_tag(topic, &self.ctx.environment);
        let consumer = channel
            .basic_consume(
                topic,
                &tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        self.consumers.insert(
            topic.to_string(),
            ActiveConsumer {
                channel: channel.clone(),
                tag: tag.clone(),
            },
        );

        let dispatcher = self.ctx.dispatcher.clone();
        let topic_owned = topic.to_string();
        tokio::spawn(async move {
            consume_messages(consumer, channel, dispatcher, &topic_owned).await;
        });

        info!(queue = topic, consumer_tag = %tag, "Consuming from queue");
        Ok(())
    }

    async fn cancel(&self, topic: &str, consumer: ActiveConsumer) {
        if let Err(e) = consumer
            .channel
            .basic_cancel(&consumer.tag, BasicCancelOptions::default())
            .await
        {
            warn!(queue = topic, error = %e, "Error cancelling consumer");
        }
        if let Err(e) = consumer.channel.close(200, "Normal shutdown").await {
            warn!(queue = topic, error = %e, "Error closing channel");
        }
    }
}

#[async_trait]
impl Transport for RabbitMqTransport {
    fn kind(&self) -> BusType {
        BusType::RabbitMq
    }

    async fn start(&self) -> Result<(), BusError> {
        for topic in self.ctx.registry.integration_handler_names() {
            self.consume(&topic).await?;
        }
        Ok(())
    }

    async fn deliver(&self, integration: &Integration, topic: &str) -> Result<(), BusError> {
        let payload = integration.to_bytes()?;
        self.declare(topic).await?;

        debug!(queue = topic, event_id = %integration.event_id(), "Publishing message");

        let confirmation = self
            .publish_channel
            .basic_publish(
                "",
                topic,
                BasicPublishOptions::default(),
                &payload,
                publish_properties(integration),
            )
            .await?
            .await
            .map_err(|e| BusError::Publish(format!("Publisher confirm failed: {}", e)))?;

        if confirmation.is_nack() {
            return Err(BusError::Publish(format!(
                "Broker refused message for queue {}",
                topic
            )));
        }

        self.ctx.emit_local(integration).await;
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn IntegrationHandler>,
    ) -> Result<(), BusError> {
        self.ctx.dispatcher.add_subscription(topic, handler);
        self.consume(topic).await
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), BusError> {
        self.ctx.dispatcher.remove_subscription(topic);
        match self.consumers.remove(topic) {
            Some((_, consumer)) => {
                self.cancel(topic, consumer).await;
                info!(queue = topic, "Unsubscribed from queue");
            }
            None => warn!(queue = topic, "No consumer to cancel"),
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BusError> {
        info!("Closing RabbitMQ connection");

        let topics: Vec<String> = self.consumers.iter().map(|c| c.key().clone()).collect();
        for topic in topics {
            if let Some((_, consumer)) = self.consumers.remove(&topic) {
                self.cancel(&topic, consumer).await;
            }
        }

        if let Err(e) = self.publish_channel.close(200, "Normal shutdown").await {
            warn!(error = %e, "Error closing publish channel");
        }
        if let Err(e) = self.connection.close(200, "Normal shutdown").await {
            warn!(error = %e, "Error closing connection");
        }
        Ok(())
    }
}

async fn consume_messages(
    mut consumer: Consumer,
    channel: Channel,
    dispatcher: Arc<InboundDispatcher>,
    topic: &str,
) {
    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!(queue = topic, error = %e, "Consumer error");
                break;
            }
        };
        let delivery_tag = delivery.delivery_tag;

        let outcome = match dispatcher.dispatch(topic, &delivery.data).await {
            Disposition::Ack => {
                channel
                    .basic_ack(delivery_tag, BasicAckOptions::default())
                    .await
            }
            Disposition::Requeue => {
                channel
                    .basic_nack(
                        delivery_tag,
                        BasicNackOptions {
                            requeue: true,
                            ..Default::default()
                        },
                    )
                    .await
            }
            Disposition::Reject => {
                channel
                    .basic_reject(delivery_tag, BasicRejectOptions { requeue: false })
                    .await
            }
        };

        if let Err(e) = outcome {
            error!(queue = topic, error = %e, "Failed to settle message");
        }
    }
    debug!(queue = topic, "Consumer stream ended");
}

//! Google Cloud Pub/Sub binding

use std::sync::Arc;

use async_trait::async_trait;
use conduit_events::{Integration, IntegrationHandler};
use dashmap::DashMap;
use google_cloud_gax::conn::Environment;
use google_cloud_googleapis::pubsub::v1::PubsubMessage;
use google_cloud_pubsub::client::{Client, ClientConfig};
use google_cloud_pubsub::publisher::Publisher;
use google_cloud_pubsub::subscription::{Subscription, SubscriptionConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BusConfig, BusType};
use crate::dispatch::{Disposition, InboundDispatcher};
use crate::error::BusError;
use crate::transport::{Transport, TransportContext};

/// Ack deadline for every subscription the binding creates
pub const ACK_DEADLINE_SECONDS: i32 = 60;

/// Subscription name for `topic` in `environment`
pub fn subscription_name(topic: &str, environment: &str) -> String {
    format!("{}-subscription-{}", topic, environment)
}

/// Settings for subscriptions the binding provisions
pub fn subscription_config() -> SubscriptionConfig {
    SubscriptionConfig {
        ack_deadline_seconds: ACK_DEADLINE_SECONDS,
        enable_message_ordering: false,
        ..Default::default()
    }
}

/// Client settings for `config`; the emulator wins over Google credentials
pub async fn client_config(config: &BusConfig) -> Result<ClientConfig, BusError> {
    let base = ClientConfig {
        project_id: config.project_id.clone(),
        ..Default::default()
    };
    match &config.emulator_host {
        Some(host) => Ok(ClientConfig {
            environment: Environment::Emulator(host.clone()),
            ..base
        }),
        None => base
            .with_auth()
            .await
            .map_err(|e| BusError::Authentication(e.to_string())),
    }
}

/// Topic-based binding. Topics and subscriptions are provisioned on demand and
/// each subscription is pulled by its own receive task.
pub struct PubSubTransport {
    ctx: TransportContext,
    client: Client,
    publishers: DashMap<String, Publisher>,
    receivers: DashMap<String, CancellationToken>,
}

impl PubSubTransport {
    pub async fn connect(config: &BusConfig, ctx: TransportContext) -> Result<Self, BusError> {
        info!(
            project_id = ?config.project_id,
            emulator = ?config.emulator_host,
            "Connecting to Google Cloud Pub/Sub"
        );

        let client = Client::new(client_config(config).await?)
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;

        info!("Connected to Google Cloud Pub/Sub successfully");

        Ok(Self {
            ctx,
            client,
            publishers: DashMap::new(),
            receivers: DashMap::new(),
        })
    }

    async fn ensure_topic(&self, topic: &str) -> Result<(), BusError> {
        let handle = self.client.topic(topic);
        if handle.exists(None).await? {
            return Ok(());
        }
        match handle.create(None, None).await.map_err(BusError::from) {
            Ok(()) => {
                info!(topic = topic, "Topic created");
                Ok(())
            }
            Err(BusError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn ensure_subscription(&self, topic: &str) -> Result<Subscription, BusError> {
        let name = subscription_name(topic, &self.ctx.environment);
        let existing = self.client.subscription(&name);
        if existing.exists(None).await? {
            return Ok(existing);
        }
        match self
            .client
            .create_subscription(&name, topic, subscription_config(), None)
            .await
            .map_err(BusError::from)
        {
            Ok(subscription) => {
                info!(topic = topic, subscription = %name, "Subscription created");
                Ok(subscription)
            }
            Err(BusError::AlreadyExists(_)) => Ok(self.client.subscription(&name)),
            Err(e) => Err(e),
        }
    }

    fn publisher(&self, topic: &str) -> Publisher {
        self.publishers
            .entry(topic.to_string())
            .or_insert_with(|| self.client.topic(topic).new_publisher(None))
            .clone()
    }

    /// Start pulling `topic` unless a receiver is already running
    async fn consume(&self, topic: &str) -> Result<(), BusError> {
        if self.receivers.contains_key(topic) {
            return Ok(());
        }

        self.ensure_topic(topic).await?;
        let subscription = self.ensure_subscription(topic).await?;

        let cancel = CancellationToken::new();
        self.receivers.insert(topic.to_string(), cancel.clone());

        let dispatcher = self.ctx.dispatcher.clone();
        let topic_owned = topic.to_string();
        tokio::spawn(async move {
            receive_messages(subscription, cancel, dispatcher, topic_owned).await;
        });

        info!(topic = topic, "Consuming from subscription");
        Ok(())
    }
}

#[async_trait]
impl Transport for PubSubTransport {
    fn kind(&self) -> BusType {
        BusType::GooglePubSub
    }

    async fn start(&self) -> Result<(), BusError> {
        for topic in self.ctx.registry.integration_handler_names() {
            self.consume(&topic).await?;
        }
        Ok(())
    }

    async fn deliver(&self, integration: &Integration, topic: &str) -> Result<(), BusError> {
        let data = integration.to_bytes()?;
        self.ensure_topic(topic).await?;

        let message = PubsubMessage {
            data,
            ..Default::default()
        };
        let message_id = self.publisher(topic).publish(message).await.get().await?;

        debug!(
            topic = topic,
            event_id = %integration.event_id(),
            message_id = %message_id,
            "Published message"
        );

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
        match self.receivers.remove(topic) {
            Some((_, cancel)) => {
                cancel.cancel();
                info!(topic = topic, "Unsubscribed from topic");
            }
            None => warn!(topic = topic, "No subscription to cancel"),
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BusError> {
        info!("Closing Google Cloud Pub/Sub clients");

        for receiver in self.receivers.iter() {
            receiver.value().cancel();
        }
        self.receivers.clear();

        let topics: Vec<String> = self.publishers.iter().map(|p| p.key().clone()).collect();
        for topic in topics {
            if let Some((_, mut publisher)) = self.publishers.remove(&topic) {
                publisher.shutdown().await;
            }
        }
        Ok(())
    }
}

async fn receive_messages(
    subscription: Subscription,
    cancel: CancellationToken,
    dispatcher: Arc<InboundDispatcher>,
    topic: String,
) {
    let handler_topic = topic.clone();
    let result = subscription
        .receive(
            move |message, _cancel| {
                let dispatcher = dispatcher.clone();
                let topic = handler_topic.clone();
                async move {
                    let settled = match dispatcher.dispatch(&topic, &message.message.data).await {
                        Disposition::Ack | Disposition::Reject => message.ack().await,
                        Disposition::Requeue => message.nack().await,
                    };
                    if let Err(e) = settled {
                        error!(topic = %topic, error = %e, "Failed to settle message");
                    }
                }
            },
            cancel,
            None,
        )
        .await;

    match result {
        Ok(()) => debug!(topic = %topic, "Receiver stopped"),
        Err(e) => error!(topic = %topic, error = %e, "Receiver failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_name() {
        assert_eq!(
            subscription_name("ItemCreated", "staging"),
            "ItemCreated-subscription-staging"
        );
    }

    #[test]
    fn test_subscription_config() {
        let config = subscription_config();
        assert_eq!(config.ack_deadline_seconds, 60);
        assert!(!config.enable_message_ordering);
    }

    #[tokio::test]
    async fn test_emulator_host_selects_emulator() {
        let config = BusConfig::new(BusType::GooglePubSub)
            .with_project_id("local-project")
            .with_emulator_host("localhost:8681");

        let client = client_config(&config).await.unwrap();
        assert_eq!(client.project_id.as_deref(), Some("local-project"));
        assert!(matches!(client.environment, Environment::Emulator(ref host) if host == "localhost:8681"));
    }
}

//! # Conduit Messaging
//!
//! Transport-agnostic event bus for Conduit services.
//!
//! [`EventBus`] deduplicates publishes by `name:eventId` and hands each
//! [`Integration`](conduit_events::Integration) to one of four bindings:
//! - **In-process** - local emitter, always available
//! - **RabbitMQ** - durable queues with ack/nack redelivery
//! - **Google Cloud Pub/Sub** - auto-provisioned topics and subscriptions
//! - **Redis** - channel pub/sub, no acknowledgement
//!
//! ## Features
//!
//! - `rabbitmq` - RabbitMQ binding via `lapin`
//! - `redis` - Redis binding
//! - `pubsub` - Google Cloud Pub/Sub binding
//! - `full` - All bindings
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use conduit_cqrs::HandlerRegistry;
//! use conduit_events::{Integration, LocalEmitter};
//! use conduit_messaging::{BusConfig, EventBus};
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(HandlerRegistry::new());
//! let emitter = Arc::new(LocalEmitter::new());
//! let bus = EventBus::connect(&BusConfig::default(), registry, emitter).await?;
//! bus.start().await?;
//!
//! let created = Integration::from_parts("ItemCreated", serde_json::json!({ "id": "x" }), "e1");
//! bus.publish(&created, None).await?;
//! bus.publish(&created, None).await?; // already processed, no-op
//! assert!(bus.is_processed("ItemCreated:e1"));
//! # Ok::<(), conduit_messaging::BusError>(())
//! # }).unwrap();
//! ```

pub mod bus;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod error;
pub mod in_process;
pub mod transport;

#[cfg(feature = "rabbitmq")]
pub mod rabbitmq;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "pubsub")]
pub mod pubsub;

pub use bus::EventBus;
pub use config::{BusConfig, BusType};
pub use dedup::{DEFAULT_DEDUP_TTL, DedupWindow, ExpiryMode, Reservation, ReservationGuard};
pub use dispatch::{Disposition, InboundDispatcher};
pub use error::BusError;
pub use in_process::InProcessTransport;
pub use transport::{Transport, TransportContext};

#[cfg(feature = "rabbitmq")]
pub use rabbitmq::RabbitMqTransport;

#[cfg(feature = "redis")]
pub use self::redis::RedisTransport;

#[cfg(feature = "pubsub")]
pub use pubsub::PubSubTransport;

//! Bus configuration

use std::env;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dedup::{DEFAULT_DEDUP_TTL, ExpiryMode};
use crate::error::BusError;

/// Which binding carries integrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusType {
    /// In-process emitter, no broker
    #[default]
    #[serde(alias = "base")]
    InProcess,
    /// Durable queues on RabbitMQ
    #[serde(rename = "rabbitmq")]
    RabbitMq,
    /// Topics and subscriptions on Google Cloud Pub/Sub
    #[serde(rename = "google-pubsub")]
    GooglePubSub,
    /// Redis channels
    Redis,
}

impl BusType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "base" | "in-process" | "inprocess" | "local" => Some(BusType::InProcess),
            "rabbitmq" | "amqp" => Some(BusType::RabbitMq),
            "google-pubsub" | "pubsub" | "gcp-pubsub" => Some(BusType::GooglePubSub),
            "redis" => Some(BusType::Redis),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BusType::InProcess => "in-process",
            BusType::RabbitMq => "rabbitmq",
            BusType::GooglePubSub => "google-pubsub",
            BusType::Redis => "redis",
        }
    }
}

impl fmt::Display for BusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the event bus and its binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Binding to use
    #[serde(default)]
    pub bus_type: BusType,
    /// AMQP URL for the RabbitMQ binding
    #[serde(default = "default_rabbitmq_url")]
    pub rabbitmq_url: String,
    /// Redis URL for the Redis binding
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Google Cloud project for the Pub/Sub binding
    pub project_id: Option<String>,
    /// Pub/Sub emulator `host:port`
    pub emulator_host: Option<String>,
    /// Environment discriminator used in consumer and subscription names
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Lifetime of processed keys
    #[serde(default = "default_dedup_ttl")]
    pub dedup_ttl: Duration,
    /// How processed keys expire
    #[serde(default)]
    pub dedup_mode: ExpiryMode,
    /// RabbitMQ consumer prefetch
    pub prefetch: Option<u16>,
}

fn default_rabbitmq_url() -> String {
    "amqp://localhost".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_dedup_ttl() -> Duration {
    DEFAULT_DEDUP_TTL
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bus_type: BusType::default(),
            rabbitmq_url: default_rabbitmq_url(),
            redis_url: default_redis_url(),
            project_id: None,
            emulator_host: None,
            environment: default_environment(),
            dedup_ttl: default_dedup_ttl(),
            dedup_mode: ExpiryMode::default(),
            prefetch: None,
        }
    }
}

impl BusConfig {
    /// Create a configuration for the given binding
    pub fn new(bus_type: BusType) -> Self {
        Self {
            bus_type,
            ..Default::default()
        }
    }

    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, BusError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unknown bus types and malformed numbers are configuration errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BusError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = get("EVENT_BUS_TYPE") {
            config.bus_type = BusType::parse(&value).ok_or_else(|| {
                BusError::Configuration(format!("unknown EVENT_BUS_TYPE '{}'", value))
            })?;
        }
        if let Some(url) = get("RABBITMQ_URL") {
            config.rabbitmq_url = url;
        }
        if let Some(url) = get("REDIS_URL") {
            config.redis_url = url;
        }
        config.project_id = get("GOOGLE_CLOUD_PROJECT_ID").or_else(|| get("GOOGLE_CLOUD_PROJECT"));
        config.emulator_host = get("PUBSUB_EMULATOR_HOST");
        if let Some(environment) = get("NODE_ENV").or_else(|| get("APP_ENV")) {
            config.environment = environment;
        }
        if let Some(value) = get("EVENT_BUS_DEDUP_TTL_SECS") {
            let secs: u64 = value.trim().parse().map_err(|_| {
                BusError::Configuration(format!("EVENT_BUS_DEDUP_TTL_SECS '{}' is not a number", value))
            })?;
            config.dedup_ttl = Duration::from_secs(secs);
        }
        if let Some(value) = get("EVENT_BUS_DEDUP_MODE") {
            config.dedup_mode = ExpiryMode::parse(&value).ok_or_else(|| {
                BusError::Configuration(format!("unknown EVENT_BUS_DEDUP_MODE '{}'", value))
            })?;
        }
        if let Some(value) = get("EVENT_BUS_PREFETCH") {
            config.prefetch = Some(value.trim().parse().map_err(|_| {
                BusError::Configuration(format!("EVENT_BUS_PREFETCH '{}' is not a number", value))
            })?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations no binding can run with
    pub fn validate(&self) -> Result<(), BusError> {
        if self.dedup_ttl.is_zero() {
            return Err(BusError::Configuration("dedup TTL must be positive".into()));
        }
        if self.bus_type == BusType::GooglePubSub
            && self.project_id.is_none()
            && self.emulator_host.is_none()
        {
            return Err(BusError::Configuration(
                "google-pubsub needs GOOGLE_CLOUD_PROJECT_ID or PUBSUB_EMULATOR_HOST".into(),
            ));
        }
        Ok(())
    }

    pub fn with_rabbitmq_url(mut self, url: impl Into<String>) -> Self {
        self.rabbitmq_url = url.into();
        self
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_emulator_host(mut self, host: impl Into<String>) -> Self {
        self.emulator_host = Some(host.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_dedup_ttl(mut self, ttl: Duration) -> Self {
        self.dedup_ttl = ttl;
        self
    }

    pub fn with_dedup_mode(mut self, mode: ExpiryMode) -> Self {
        self.dedup_mode = mode;
        self
    }

    pub fn with_prefetch(mut self, prefetch: u16) -> Self {
        self.prefetch = Some(prefetch);
        self
    }
}

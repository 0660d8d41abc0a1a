//! Error types for bus operations

use conduit_events::HandlerError;
use thiserror::Error;

/// Errors that can occur while publishing through or consuming from a binding
#[derive(Error, Debug)]
pub enum BusError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Failed to publish a message
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Failed to subscribe to a topic/queue
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    /// Failed to acknowledge a message
    #[error("Acknowledge failed: {0}")]
    Acknowledge(String),

    /// Failed to serialize a message
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Channel/connection is closed
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Queue/topic not found
    #[error("Queue/topic not found: {0}")]
    NotFound(String),

    /// Queue/topic already exists
    #[error("Queue/topic already exists: {0}")]
    AlreadyExists(String),

    /// Resource exhausted (e.g., too many channels)
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Internal broker error
    #[error("Broker error: {0}")]
    BrokerError(String),
}

impl BusError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BusError::Connection(_)
                | BusError::Timeout(_)
                | BusError::ChannelClosed(_)
                | BusError::ResourceExhausted(_)
                | BusError::BrokerError(_)
        )
    }

    /// Check if this error indicates a connection issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            BusError::Connection(_) | BusError::ChannelClosed(_) | BusError::Authentication(_)
        )
    }
}

impl From<BusError> for HandlerError {
    fn from(err: BusError) -> Self {
        HandlerError::Publish(err.to_string())
    }
}

#[cfg(feature = "rabbitmq")]
impl From<lapin::Error> for BusError {
    fn from(err: lapin::Error) -> Self {
        match &err {
            lapin::Error::IOError(_) => BusError::Connection(err.to_string()),
            lapin::Error::ChannelsLimitReached => BusError::ResourceExhausted(err.to_string()),
            lapin::Error::InvalidChannelState(_) => BusError::ChannelClosed(err.to_string()),
            lapin::Error::InvalidConnectionState(_) => BusError::Connection(err.to_string()),
            _ => BusError::BrokerError(err.to_string()),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for BusError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            BusError::Timeout(err.to_string())
        } else if err.is_connection_dropped() {
            BusError::ChannelClosed(err.to_string())
        } else if err.is_io_error() || err.is_connection_refusal() {
            BusError::Connection(err.to_string())
        } else {
            BusError::BrokerError(err.to_string())
        }
    }
}

#[cfg(feature = "pubsub")]
impl From<google_cloud_gax::grpc::Status> for BusError {
    fn from(status: google_cloud_gax::grpc::Status) -> Self {
        use google_cloud_gax::grpc::Code;

        let message = status.message().to_string();
        match status.code() {
            Code::AlreadyExists => BusError::AlreadyExists(message),
            Code::NotFound => BusError::NotFound(message),
            Code::DeadlineExceeded => BusError::Timeout(message),
            Code::Unavailable => BusError::Connection(message),
            Code::ResourceExhausted => BusError::ResourceExhausted(message),
            Code::Unauthenticated | Code::PermissionDenied => BusError::Authentication(message),
            _ => BusError::BrokerError(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(BusError::Connection("refused".into()).is_retryable());
        assert!(BusError::Timeout("slow".into()).is_retryable());
        assert!(!BusError::Configuration("bad".into()).is_retryable());
        assert!(!BusError::AlreadyExists("topic".into()).is_retryable());
    }

    #[test]
    fn test_into_handler_error() {
        let err: HandlerError = BusError::Publish("queue full".into()).into();
        assert!(matches!(err, HandlerError::Publish(m) if m.contains("queue full")));
    }
}

//! Port through which domain code republishes events as integrations

use crate::handler::HandlerError;
use crate::integration::Integration;
use async_trait::async_trait;

/// Publishes integrations without knowing which transport carries them.
///
/// Implementations deduplicate by `name:eventId`, so publishing the same
/// envelope twice delivers it once.
#[async_trait]
pub trait IntegrationPublisher: Send + Sync {
    /// Publish to `topic`, or to the envelope's name when `topic` is `None`.
    async fn publish_integration(
        &self,
        integration: Integration,
        topic: Option<&str>,
    ) -> Result<(), HandlerError>;
}

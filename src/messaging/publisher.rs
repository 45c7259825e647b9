use async_trait::async_trait;

use crate::event_sourcing::OutboxMessage;
use crate::utils::IsTransient;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Sink is down or the data it needs is not there yet
    #[error("Publisher unavailable: {0}")]
    Unavailable(String),

    #[error("Circuit breaker '{0}' is open")]
    CircuitOpen(String),

    /// The message itself is unusable; retrying will not help
    #[error("Message rejected: {0}")]
    Rejected(String),
}

impl IsTransient for PublishError {
    fn is_transient(&self) -> bool {
        !matches!(self, PublishError::Rejected(_))
    }
}

/// Destination for outbox messages
#[async_trait]
pub trait EventPublisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, message: &OutboxMessage) -> Result<(), PublishError>;

    /// Whether the publisher is currently refusing work
    async fn is_degraded(&self) -> bool {
        false
    }
}

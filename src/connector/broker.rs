use super::message::{InboundMessage, OutboundMessage};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("publish to '{exchange}'/'{routing_key}' failed: {reason}")]
    Publish {
        exchange: String,
        routing_key: String,
        reason: String,
    },
    #[error("subscribe to '{queue}' failed: {reason}")]
    Subscribe { queue: String, reason: String },
}

/// Receives messages from a subscription.
///
/// Called on a listener thread owned by the broker client. The call blocks
/// that listener until it returns.
pub trait MessageSink: Send + Sync {
    fn on_message(&self, message: InboundMessage);
}

/// The message-broker client the connector publishes through and subscribes with.
pub trait BrokerClient: Send + Sync {
    /// # Errors
    ///
    /// [`BrokerError::Publish`] when the broker refuses the message.
    fn publish(&self, message: OutboundMessage) -> Result<(), BrokerError>;

    /// Start delivering `queue` to `sink`.
    ///
    /// # Errors
    ///
    /// [`BrokerError::Subscribe`] when the listener cannot be started.
    fn subscribe(&self, queue: &str, sink: Arc<dyn MessageSink>) -> Result<(), BrokerError>;
}

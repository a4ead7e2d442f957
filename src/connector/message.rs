use bytes::Bytes;

/// Exchange name that routes by queue name (routing key == queue).
pub const DEFAULT_EXCHANGE: &str = "";

/// Transport-level metadata carried alongside a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    /// Queue the sender wants the response delivered to.
    pub reply_to: Option<String>,
    /// Token echoed back on the response so the sender can pair it up.
    pub correlation_id: Option<String>,
}

impl MessageProperties {
    #[must_use]
    pub fn correlated(reply_to: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            reply_to: Some(reply_to.into()),
            correlation_id: Some(correlation_id.into()),
        }
    }
}

/// A message delivered to one of our subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub queue: String,
    pub payload: Bytes,
    pub properties: MessageProperties,
}

impl InboundMessage {
    pub fn new(queue: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            queue: queue.into(),
            payload: payload.into(),
            properties: MessageProperties::default(),
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: MessageProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Both reply-to and correlation id, when the sender supplied both.
    #[must_use]
    pub fn reply_address(&self) -> Option<(&str, &str)> {
        match (&self.properties.reply_to, &self.properties.correlation_id) {
            (Some(reply_to), Some(correlation_id)) => {
                Some((reply_to.as_str(), correlation_id.as_str()))
            }
            _ => None,
        }
    }
}

/// A message handed to the broker for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Bytes,
    pub properties: MessageProperties,
}

impl OutboundMessage {
    pub fn new(exchange: impl Into<String>, routing_key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            payload: payload.into(),
            properties: MessageProperties::default(),
        }
    }

    /// Publish straight to `queue` through the default exchange.
    pub fn to_queue(queue: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self::new(DEFAULT_EXCHANGE, queue, payload)
    }

    #[must_use]
    pub fn with_properties(mut self, properties: MessageProperties) -> Self {
        self.properties = properties;
        self
    }
}

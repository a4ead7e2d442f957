use super::broker::{BrokerClient, BrokerError, MessageSink};
use super::message::{InboundMessage, MessageProperties, OutboundMessage};
use super::pending::{PendingRequests, ReplyFuture};
use crate::document::{self, Document};
use crate::ids::CorrelationId;
use crate::registry::ComponentRegistry;
use crate::routing::RoutingTable;
use crate::runtime_config::RuntimeConfig;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Default time a request-reply exchange waits for its answer.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// Deadline applied by [`MessageConnector::send_message`].
    pub reply_timeout: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

impl From<&RuntimeConfig> for ConnectorConfig {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            reply_timeout: config.reply_timeout,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The process failed. Not retried; the message is consumed.
    #[error("process '{process_name}' failed: {source}")]
    Execution {
        process_name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("no tokio runtime available to drive reply timeouts")]
    NoRuntime,
}

/// Where the response to an inbound message went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    /// The sender's reply-to address, tagged with its correlation id.
    Correlated { queue: String, correlation_id: String },
    /// The rule's static `replyQueueName`, untagged.
    Static { queue: String },
    /// Fire-and-forget.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NoRoute,
    NoProcess,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::NoRoute => write!(f, "no_route"),
            DropReason::NoProcess => write!(f, "no_process"),
        }
    }
}

/// Terminal state of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The message answered one of our outstanding requests.
    ReplyCompleted { correlation_id: CorrelationId },
    Dispatched {
        process_name: String,
        reply: ReplyTarget,
    },
    Dropped { reason: DropReason },
}

/// Asynchronous side of the dispatch core.
///
/// Owns its pending-request table and its subscription set. Build one per
/// broker connection with [`MessageConnector::new`], then call
/// [`MessageConnector::start`] to subscribe to every queue the routing rules
/// listen on.
///
/// Inbound messages are handled on the broker's listener thread and block it
/// until the process returns; a slow process slows consumption of its queue.
pub struct MessageConnector {
    routes: Arc<RoutingTable>,
    registry: Arc<ComponentRegistry>,
    broker: Arc<dyn BrokerClient>,
    pending: Arc<PendingRequests>,
    config: ConnectorConfig,
    runtime: Handle,
    subscribed: Mutex<BTreeSet<String>>,
    self_ref: Weak<MessageConnector>,
}

impl MessageConnector {
    /// Reply timeouts are scheduled on `runtime`.
    pub fn new(
        routes: Arc<RoutingTable>,
        registry: Arc<ComponentRegistry>,
        broker: Arc<dyn BrokerClient>,
        config: ConnectorConfig,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            routes,
            registry,
            broker,
            pending: Arc::new(PendingRequests::new()),
            config,
            runtime,
            subscribed: Mutex::new(BTreeSet::new()),
            self_ref: self_ref.clone(),
        })
    }

    /// Like [`MessageConnector::new`], using the ambient tokio runtime.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::NoRuntime`] when called outside a tokio runtime.
    pub fn from_current(
        routes: Arc<RoutingTable>,
        registry: Arc<ComponentRegistry>,
        broker: Arc<dyn BrokerClient>,
        config: ConnectorConfig,
    ) -> Result<Arc<Self>, ConnectorError> {
        let runtime = Handle::try_current().map_err(|_| ConnectorError::NoRuntime)?;
        Ok(Self::new(routes, registry, broker, config, runtime))
    }

    #[must_use]
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Queues this connector currently receives from.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscribed.lock().iter().cloned().collect()
    }

    /// Subscribe to every queue named by a queue trigger.
    ///
    /// # Errors
    ///
    /// The first [`BrokerError`] hit; queues subscribed before it stay subscribed.
    pub fn start(&self) -> Result<(), ConnectorError> {
        for queue in self.routes.listen_queues() {
            self.ensure_subscribed(queue)?;
        }
        info!(
            queues = ?self.routes.listen_queues(),
            "Message connector listening"
        );
        Ok(())
    }

    fn ensure_subscribed(&self, queue: &str) -> Result<(), ConnectorError> {
        let mut subscribed = self.subscribed.lock();
        if subscribed.contains(queue) {
            return Ok(());
        }
        let Some(sink) = self.self_ref.upgrade() else {
            // Only reachable while the connector is being dropped.
            return Ok(());
        };
        let sink: Arc<dyn MessageSink> = sink;
        self.broker.subscribe(queue, sink)?;
        subscribed.insert(queue.to_string());
        debug!(queue = %queue, "Subscribed to queue");
        Ok(())
    }

    /// Process one inbound message.
    ///
    /// 1. A reply to one of our outstanding requests completes that request.
    ///    Replies carry a correlation id and no reply-to address.
    /// 2. Otherwise the payload is parsed (non-JSON becomes `{"message": text}`),
    ///    the queue is routed and the process invoked on this thread.
    /// 3. The response goes to the sender's reply-to address (tagged with its
    ///    correlation id), else to the rule's static reply queue, else nowhere.
    ///
    /// Unroutable messages and messages for unregistered processes are dropped.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::Execution`] if the process fails, and broker or
    /// encoding errors while replying. None of them is retried.
    pub fn handle_message(&self, message: InboundMessage) -> Result<Delivery, ConnectorError> {
        let queue = message.queue.as_str();
        let payload = document::parse_payload(&message.payload);

        // A message with a reply-to address is a request, even when it carries
        // one of our correlation ids and arrives on a queue we await replies on.
        if message.properties.reply_to.is_none() {
            if let Some(correlation_id) = message
                .properties
                .correlation_id
                .as_deref()
                .and_then(|raw| raw.parse::<CorrelationId>().ok())
            {
                if self.pending.complete_from(queue, correlation_id, payload.clone()) {
                    return Ok(Delivery::ReplyCompleted { correlation_id });
                }
            }
        }

        let Some(route) = self.routes.match_queue_route(queue) else {
            warn!(queue = %queue, "No route for queue; message dropped");
            return Ok(Delivery::Dropped {
                reason: DropReason::NoRoute,
            });
        };
        let process_name = route.process_name;

        let Some(process) = self.registry.resolve(process_name) else {
            warn!(
                queue = %queue,
                process_name = %process_name,
                available_processes = ?self.registry.names(),
                "No process registered; message dropped"
            );
            return Ok(Delivery::Dropped {
                reason: DropReason::NoProcess,
            });
        };

        info!(
            queue = %queue,
            process_name = %process_name,
            correlation_id = message.properties.correlation_id.as_deref().unwrap_or(""),
            "Message dispatched to process"
        );

        let start = Instant::now();
        let output = process.handle(payload).map_err(|source| {
            error!(
                queue = %queue,
                process_name = %process_name,
                latency_ms = start.elapsed().as_millis() as u64,
                error = %source,
                "Process failed"
            );
            ConnectorError::Execution {
                process_name: process_name.to_string(),
                source,
            }
        })?;

        let reply = if let Some((reply_to, correlation_id)) = message.reply_address() {
            let out = OutboundMessage::to_queue(reply_to, serde_json::to_vec(&output)?)
                .with_properties(MessageProperties {
                    reply_to: None,
                    correlation_id: Some(correlation_id.to_string()),
                });
            self.broker.publish(out)?;
            ReplyTarget::Correlated {
                queue: reply_to.to_string(),
                correlation_id: correlation_id.to_string(),
            }
        } else if let Some(reply_queue) = route.reply_queue {
            self.broker.publish(OutboundMessage::to_queue(
                reply_queue,
                serde_json::to_vec(&output)?,
            ))?;
            ReplyTarget::Static {
                queue: reply_queue.to_string(),
            }
        } else {
            ReplyTarget::None
        };

        debug!(
            queue = %queue,
            process_name = %process_name,
            latency_ms = start.elapsed().as_millis() as u64,
            reply = ?reply,
            "Message processed"
        );

        Ok(Delivery::Dispatched {
            process_name: process_name.to_string(),
            reply,
        })
    }

    /// Publish `payload` and, when `reply_queue` is given, wait for the answer
    /// for at most [`ConnectorConfig::reply_timeout`].
    ///
    /// Returns immediately. Without a reply queue the returned future is
    /// already resolved to `null`.
    ///
    /// # Errors
    ///
    /// Broker or encoding failures while publishing. A publish failure leaves
    /// no pending entry behind.
    pub fn send_message(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &Document,
        reply_queue: Option<&str>,
    ) -> Result<ReplyFuture, ConnectorError> {
        self.send_message_with_timeout(
            exchange,
            routing_key,
            payload,
            reply_queue,
            self.config.reply_timeout,
        )
    }

    /// [`MessageConnector::send_message`] with an explicit reply deadline.
    ///
    /// # Errors
    ///
    /// See [`MessageConnector::send_message`].
    pub fn send_message_with_timeout(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &Document,
        reply_queue: Option<&str>,
        timeout: Duration,
    ) -> Result<ReplyFuture, ConnectorError> {
        let body = serde_json::to_vec(payload)?;

        let Some(reply_queue) = reply_queue else {
            self.broker
                .publish(OutboundMessage::new(exchange, routing_key, body))?;
            debug!(
                exchange = %exchange,
                routing_key = %routing_key,
                "Fire-and-forget message published"
            );
            return Ok(ReplyFuture::ready(Value::Null));
        };

        self.ensure_subscribed(reply_queue)?;

        let correlation_id = CorrelationId::new();
        let future = self
            .pending
            .register(correlation_id, reply_queue, timeout, &self.runtime);

        let message = OutboundMessage::new(exchange, routing_key, body).with_properties(
            MessageProperties::correlated(reply_queue, correlation_id.to_string()),
        );
        if let Err(err) = self.broker.publish(message) {
            self.pending.cancel(correlation_id);
            return Err(err.into());
        }

        info!(
            exchange = %exchange,
            routing_key = %routing_key,
            reply_queue = %reply_queue,
            correlation_id = %correlation_id,
            timeout_ms = timeout.as_millis() as u64,
            "Request published"
        );
        Ok(future)
    }

    /// Stop waiting for `correlation_id`. Returns `false` if it was already settled.
    pub fn cancel(&self, correlation_id: CorrelationId) -> bool {
        self.pending.cancel(correlation_id)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains(correlation_id)
    }
}

impl MessageSink for MessageConnector {
    fn on_message(&self, message: InboundMessage) {
        let queue = message.queue.clone();
        match self.handle_message(message) {
            Ok(delivery) => debug!(queue = %queue, delivery = ?delivery, "Message handled"),
            Err(err) => error!(queue = %queue, error = %err, "Message handling failed"),
        }
    }
}

impl std::fmt::Debug for MessageConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageConnector")
            .field("config", &self.config)
            .field("subscribed", &*self.subscribed.lock())
            .field("pending", &self.pending.len())
            .finish()
    }
}

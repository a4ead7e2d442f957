use super::broker::{BrokerClient, BrokerError, MessageSink};
use super::message::{InboundMessage, OutboundMessage, DEFAULT_EXCHANGE};
use crate::runtime_config::{RuntimeConfig, DEFAULT_STACK_SIZE};
use may::sync::mpsc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Default listener coroutine stack (64 KB).
pub const DEFAULT_LISTENER_STACK_SIZE: usize = DEFAULT_STACK_SIZE;

/// Published messages kept for inspection before the oldest are discarded.
pub const DEFAULT_PUBLISH_LOG_CAPACITY: usize = 1024;

#[derive(Default)]
struct BrokerState {
    listeners: HashMap<String, mpsc::Sender<InboundMessage>>,
    backlog: HashMap<String, VecDeque<InboundMessage>>,
    bindings: HashMap<(String, String), String>,
    published: VecDeque<OutboundMessage>,
}

/// Process-local broker for tests and local wiring.
///
/// Messages published to the default exchange go to the queue named by the
/// routing key; other exchanges route through [`InMemoryBroker::bind`].
/// Each subscribed queue is drained by its own `may` coroutine, which calls
/// the sink once per message in arrival order. Messages for a queue nobody
/// listens on wait in a backlog until someone subscribes; the backlog is not
/// bounded, so every queue that receives traffic needs a listener eventually.
///
/// The publish log keeps the most recent [`DEFAULT_PUBLISH_LOG_CAPACITY`]
/// messages (see [`InMemoryBroker::with_publish_log_capacity`]).
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    stack_size: usize,
    log_capacity: usize,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_stack_size(DEFAULT_LISTENER_STACK_SIZE)
    }

    #[must_use]
    pub fn with_stack_size(stack_size: usize) -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
            stack_size,
            log_capacity: DEFAULT_PUBLISH_LOG_CAPACITY,
        }
    }

    /// Listener coroutines sized by [`RuntimeConfig::stack_size`].
    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::with_stack_size(config.stack_size)
    }

    /// Keep at most `capacity` messages in the publish log.
    #[must_use]
    pub fn with_publish_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Route `(exchange, routing_key)` to `queue`.
    pub fn bind(&self, exchange: &str, routing_key: &str, queue: &str) {
        self.state.lock().bindings.insert(
            (exchange.to_string(), routing_key.to_string()),
            queue.to_string(),
        );
    }

    /// Deliver a message straight to its queue, as if a peer had published it.
    pub fn inject(&self, message: InboundMessage) {
        let mut state = self.state.lock();
        Self::deliver(&mut state, message);
    }

    /// The retained publish log, oldest first.
    #[must_use]
    pub fn published(&self) -> Vec<OutboundMessage> {
        self.state.lock().published.iter().cloned().collect()
    }

    /// Messages published to the default exchange with `queue` as routing key.
    #[must_use]
    pub fn published_to(&self, queue: &str) -> Vec<OutboundMessage> {
        self.state
            .lock()
            .published
            .iter()
            .filter(|m| m.exchange == DEFAULT_EXCHANGE && m.routing_key == queue)
            .cloned()
            .collect()
    }

    /// Messages waiting for a listener on `queue`.
    #[must_use]
    pub fn backlog_len(&self, queue: &str) -> usize {
        self.state.lock().backlog.get(queue).map_or(0, VecDeque::len)
    }

    #[must_use]
    pub fn has_listener(&self, queue: &str) -> bool {
        self.state.lock().listeners.contains_key(queue)
    }

    fn resolve_queue(state: &BrokerState, message: &OutboundMessage) -> Option<String> {
        if message.exchange == DEFAULT_EXCHANGE {
            return Some(message.routing_key.clone());
        }
        state
            .bindings
            .get(&(message.exchange.clone(), message.routing_key.clone()))
            .cloned()
    }

    fn deliver(state: &mut BrokerState, message: InboundMessage) {
        let queue = message.queue.clone();
        if let Some(tx) = state.listeners.get(&queue) {
            match tx.send(message) {
                Ok(()) => return,
                Err(std::sync::mpsc::SendError(message)) => {
                    warn!(queue = %queue, "Listener gone; message moved to backlog");
                    state.listeners.remove(&queue);
                    state.backlog.entry(queue).or_default().push_back(message);
                    return;
                }
            }
        }
        debug!(queue = %queue, "No listener; message queued");
        state.backlog.entry(queue).or_default().push_back(message);
    }
}

impl BrokerClient for InMemoryBroker {
    fn publish(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.published.push_back(message.clone());
        while state.published.len() > self.log_capacity {
            state.published.pop_front();
        }

        let Some(queue) = Self::resolve_queue(&state, &message) else {
            warn!(
                exchange = %message.exchange,
                routing_key = %message.routing_key,
                "Unroutable message discarded"
            );
            return Ok(());
        };

        let inbound = InboundMessage::new(queue, message.payload).with_properties(message.properties);
        Self::deliver(&mut state, inbound);
        Ok(())
    }

    fn subscribe(&self, queue: &str, sink: Arc<dyn MessageSink>) -> Result<(), BrokerError> {
        let (tx, rx) = mpsc::channel::<InboundMessage>();
        let listener_queue = queue.to_string();

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // Safe because: the closure owns everything it touches and is Send + 'static.
        let spawned = unsafe {
            may::coroutine::Builder::new()
                .name(format!("listener:{queue}"))
                .stack_size(self.stack_size)
                .spawn(move || {
                    for message in rx.iter() {
                        if let Err(panic) =
                            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                sink.on_message(message);
                            }))
                        {
                            error!(
                                queue = %listener_queue,
                                panic_message = ?panic,
                                "Message sink panicked"
                            );
                        }
                    }
                    debug!(queue = %listener_queue, "Listener stopped");
                })
        };
        spawned.map_err(|err| BrokerError::Subscribe {
            queue: queue.to_string(),
            reason: err.to_string(),
        })?;

        let mut state = self.state.lock();
        if let Some(backlog) = state.backlog.remove(queue) {
            debug!(queue = %queue, count = backlog.len(), "Draining backlog");
            for message in backlog {
                // The receiver is alive until `tx` is dropped.
                let _ = tx.send(message);
            }
        }
        if state.listeners.insert(queue.to_string(), tx).is_some() {
            warn!(queue = %queue, "Replaced existing listener");
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryBroker")
            .field("listeners", &state.listeners.keys().collect::<Vec<_>>())
            .field("published", &state.published.len())
            .field("stack_size", &self.stack_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_uses_configured_stack_size() {
        let config = RuntimeConfig::from_lookup(|key| {
            (key == "PROCDISPATCH_STACK_SIZE").then(|| "0x20000".to_string())
        });
        assert_eq!(InMemoryBroker::from_config(&config).stack_size(), 0x20000);
        assert_eq!(
            InMemoryBroker::from_config(&RuntimeConfig::default()).stack_size(),
            DEFAULT_LISTENER_STACK_SIZE
        );
    }

    #[test]
    fn test_publish_log_keeps_most_recent() {
        let broker = InMemoryBroker::new().with_publish_log_capacity(2);
        for key in ["a", "b", "c"] {
            broker.publish(OutboundMessage::to_queue(key, "{}")).unwrap();
        }
        let keys: Vec<String> = broker
            .published()
            .into_iter()
            .map(|m| m.routing_key)
            .collect();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string()]);
        // Delivery is unaffected by the log cap.
        assert_eq!(broker.backlog_len("a"), 1);
    }

    #[test]
    fn test_unbound_exchange_is_logged_but_not_queued() {
        let broker = InMemoryBroker::new();
        broker
            .publish(OutboundMessage::new("orders", "created", "{}"))
            .unwrap();
        assert_eq!(broker.published().len(), 1);
        assert_eq!(broker.backlog_len("created"), 0);
    }
}

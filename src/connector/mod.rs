//! # Connector Module
//!
//! The asynchronous path: queue subscriptions, inbound dispatch and
//! correlation-id request-reply.
//!
//! ## Inbound
//!
//! Every inbound message ends in one [`Delivery`]:
//!
//! ```text
//! received ─┬─ correlation id is ours ─────────────► ReplyCompleted
//!           └─ route queue ─┬─ no rule ────────────► Dropped(NoRoute)
//!                           ├─ no process ─────────► Dropped(NoProcess)
//!                           └─ invoke ─► reply ────► Dispatched
//! ```
//!
//! Reply priority: the sender's reply-to + correlation id, then the rule's
//! static `replyQueueName`, then nothing. Dropped messages are logged and
//! never retried.
//!
//! ## Outbound request-reply
//!
//! [`MessageConnector::send_message`] tags the message with a fresh
//! [`crate::ids::CorrelationId`], records it in [`PendingRequests`] and returns
//! a [`ReplyFuture`]. The first of reply, timeout or cancel settles the
//! future and removes the entry; the others find nothing to do.
//!
//! ## Brokers
//!
//! The connector talks to the broker through [`BrokerClient`] and receives
//! through [`MessageSink`]. [`InMemoryBroker`] implements both ends in-process.

mod broker;
mod core;
mod memory;
mod message;
mod pending;

pub use broker::{BrokerClient, BrokerError, MessageSink};
pub use core::{
    ConnectorConfig, ConnectorError, Delivery, DropReason, MessageConnector, ReplyTarget,
    DEFAULT_REPLY_TIMEOUT,
};
pub use memory::{InMemoryBroker, DEFAULT_LISTENER_STACK_SIZE, DEFAULT_PUBLISH_LOG_CAPACITY};
pub use message::{InboundMessage, MessageProperties, OutboundMessage, DEFAULT_EXCHANGE};
pub use pending::{PendingRequests, ReplyError, ReplyFuture};

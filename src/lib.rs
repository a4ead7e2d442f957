//! # procdispatch
//!
//! **procdispatch** is a pluggable dispatch core: it keeps a registry of named
//! processes, matches inbound REST calls and queue messages to them through
//! declarative routing rules, adapts heterogeneous process shapes into one call
//! contract, and runs correlated request-reply over a message broker with
//! timeouts.
//!
//! ## Architecture
//!
//! - **[`registry`]** - Name → process map, populated at startup, read concurrently
//! - **[`routing`]** - Ordered REST/queue rules and the matcher
//! - **[`adapter`]** - Capability traits and the wrappers that turn components into [`adapter::Process`]es
//! - **[`dispatcher`]** - Synchronous REST dispatch
//! - **[`connector`]** - Queue dispatch, reply routing and correlated request-reply
//! - **[`document`]** - The JSON envelope passed between transports and processes
//! - **[`ids`]** - ULID-based request and correlation identifiers
//! - **[`runtime_config`]** / **[`telemetry`]** - Environment configuration and logging
//!
//! ```mermaid
//! flowchart LR
//!     HTTP[transport] -->|path, method, body| RD[RestDispatcher]
//!     MQ[broker] -->|InboundMessage| MC[MessageConnector]
//!     RD --> RT[RoutingTable]
//!     MC --> RT
//!     RD --> REG[ComponentRegistry]
//!     MC --> REG
//!     REG --> P[Process]
//!     MC -->|reply / request| MQ
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use procdispatch::echo::EchoProcess;
//! use procdispatch::registry::{ComponentRegistry, ProcessKind};
//! use procdispatch::routing::RoutingTable;
//! use procdispatch::dispatcher::RestDispatcher;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let routes = RoutingTable::from_yaml_str(r#"
//! - processName: echo
//!   triggers:
//!     - { type: rest, path: /api/echo, method: POST }
//! "#).unwrap();
//!
//! let mut registry = ComponentRegistry::new();
//! registry
//!     .register("echo", Arc::new(EchoProcess), ProcessKind::DomainLogic, None)
//!     .unwrap();
//!
//! let dispatcher = RestDispatcher::new(Arc::new(routes), Arc::new(registry));
//! let response = dispatcher.handle("/api/echo", "POST", Some(json!({"a": 1}))).unwrap();
//! assert_eq!(response.body, Some(json!({"a": 1})));
//! ```
//!
//! ## Error policy
//!
//! Domain logic failures are turned into error documents by the adapter.
//! Business process failures propagate: out of [`dispatcher::RestDispatcher::handle`]
//! as [`dispatcher::DispatchError`] and out of
//! [`connector::MessageConnector::handle_message`] as [`connector::ConnectorError`].
//! Nothing is retried.

pub mod adapter;
pub mod cli;
pub mod connector;
pub mod dispatcher;
pub mod document;
pub mod echo;
pub mod ids;
pub mod registry;
pub mod routing;
pub mod runtime_config;
pub mod telemetry;

pub use adapter::{Component, Handler, MetadataProvider, Process, Validator};
pub use connector::{MessageConnector, ReplyError, ReplyFuture};
pub use dispatcher::{DispatchError, RestDispatcher, RestResponse};
pub use document::Document;
pub use ids::{CorrelationId, RequestId};
pub use registry::{ComponentRegistry, ProcessKind, ProcessMetadata};
pub use routing::{load_routing_config, RoutingRule, RoutingTable, Trigger};

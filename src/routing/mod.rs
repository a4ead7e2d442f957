//! # Routing Module
//!
//! Ordered rules that map an inbound request to a process name.
//!
//! ## Configuration shape
//!
//! ```yaml
//! - processName: echo
//!   triggers:
//!     - { type: rest, path: "/api/echo", method: POST }
//!     - { type: queue, queueName: echo.requests, replyQueueName: echo.replies }
//! - processName: orders
//!   triggers:
//!     - { type: rest, path: "/api/orders/[0-9]+", method: GET }
//! ```
//!
//! ## Matching
//!
//! - **REST**: the first rule with a `rest` trigger whose `path` regex matches
//!   the *whole* request path and whose `method` equals the request method
//!   (case-insensitive). `/api/test` never matches `/api/test/extra`.
//! - **Queue**: the first rule with a `queue` trigger naming the queue.
//! - **Listen set**: the union of all queue trigger names, computed once.
//!
//! Rules are static for the life of the process.

mod core;
mod rule;

pub use core::{load_routing_config, QueueRoute, RoutingError, RoutingTable};
pub use rule::{RoutingRule, Trigger};

//! # Dispatcher Module
//!
//! The synchronous REST path.
//!
//! ## Request Flow
//!
//! 1. [`crate::routing::RoutingTable::match_rest`] resolves `(path, method)` to a process name
//! 2. [`crate::registry::ComponentRegistry::resolve`] finds the process
//! 3. The process runs on the caller's thread; the call blocks until it returns
//! 4. The result comes back as a [`RestResponse`]
//!
//! ## Error Handling
//!
//! - No matching rule, or no registered process: 404 [`RestResponse`]
//! - Process error: [`DispatchError::Execution`], returned to the transport
//!
//! The dispatcher never turns a process failure into a response body. Domain
//! logic processes already do that themselves (see [`crate::adapter`]);
//! business processes do not, and their failures reach the transport intact.
//!
//! No queuing or pooling happens here: concurrency is whatever the transport
//! calling [`RestDispatcher::handle`] provides.

mod core;

pub use core::{DispatchError, RestDispatcher, RestResponse};

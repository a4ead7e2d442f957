//! # Registry Module
//!
//! Name → process map built once at startup and read concurrently afterwards.
//!
//! Registration is explicit: a bootstrap function (or a discovery mechanism
//! outside this crate) hands over `(name, instance, kind, metadata)` tuples.
//!
//! ```rust
//! use procdispatch::adapter::handler_fn;
//! use procdispatch::registry::{ComponentRegistry, ProcessKind};
//! use std::sync::Arc;
//!
//! let mut registry = ComponentRegistry::new();
//! registry
//!     .register("echo", Arc::new(handler_fn(Ok)), ProcessKind::BusinessProcess, None)
//!     .unwrap();
//! let registry = Arc::new(registry);
//! assert!(registry.resolve("echo").is_some());
//! ```
//!
//! ## Duplicates
//!
//! By default a second registration under the same name replaces the first
//! and is logged at `warn`. [`DuplicatePolicy::Reject`] turns that into an error.

mod core;

pub use core::{
    ComponentRegistry, DuplicatePolicy, ProcessDescriptor, ProcessKind, ProcessMetadata,
    Registration, RegistryError,
};

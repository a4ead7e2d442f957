//! # Adapter Module
//!
//! Makes any registered component usable through one contract, [`Process`]:
//! `handle`, `validate`, `metadata`, `name`.
//!
//! ## Capabilities
//!
//! Components opt into behavior through a closed set of capability traits,
//! exposed via [`Component`] accessors that default to `None`:
//!
//! | Accessor | Capability | Used for |
//! |----------|------------|----------|
//! | `as_handler` | [`Handler`] | `handle` (first choice) |
//! | `operation(name)` | [`Handler`] | `handle` (second choice) |
//! | `as_validator` | [`Validator`] | `validate` |
//! | `as_metadata_provider` | [`MetadataProvider`] | `metadata` |
//!
//! Probing happens once, at registration, and the outcome is cached.
//!
//! ## Two invocation styles
//!
//! - [`DomainLogicAdapter`] catches every error or panic from the component and
//!   returns `{ "error": "Failed to execute domain logic", "operation", "message" }`.
//!   If the component has no entry point at all, it answers with an
//!   introspection document instead of failing.
//! - [`BusinessProcess`] lets failures propagate to the caller.
//!
//! No other layer of the dispatch core converts failures into data.

mod business;
mod capability;
mod core;

pub use business::BusinessProcess;
pub use capability::{handler_fn, Component, Handler, HandlerFn, MetadataProvider, Validator};
pub use core::{DomainLogicAdapter, HandleTarget, Process, EXECUTION_FAILURE};

//! # CLI Module
//!
//! Command-line tooling for inspecting routing configuration and trying the
//! REST dispatcher against it.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! Print every trigger of every rule, in declaration order, followed by the
//! queue listen set:
//!
//! ```bash
//! procdispatch routes --config routing.yaml
//! ```
//!
//! ### `match`
//!
//! Resolve a REST request. Exits with status 1 when nothing matches:
//!
//! ```bash
//! procdispatch match --config routing.yaml --method post --path /api/echo
//! ```
//!
//! ### `queue`
//!
//! Resolve a queue name to its process and static reply queue:
//!
//! ```bash
//! procdispatch queue --config routing.yaml --queue echo.requests
//! ```
//!
//! ### `dispatch`
//!
//! Run the REST dispatcher with every routed process bound to
//! [`crate::echo::EchoProcess`]:
//!
//! ```bash
//! procdispatch dispatch --config routing.yaml --method POST --path /api/echo --body '{"a":1}'
//! ```
//!
//! `--config` may also come from `PROCDISPATCH_ROUTING_CONFIG`.

mod commands;


pub use commands::{run_cli, Cli, Commands, Outcome};

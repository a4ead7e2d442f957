//! # Runtime Configuration Module
//!
//! Environment-driven settings for the dispatch core.
//!
//! ## Environment Variables
//!
//! ### `PROCDISPATCH_REPLY_TIMEOUT_MS`
//!
//! How long [`crate::connector::MessageConnector::send_message`] waits for a
//! correlated reply before failing the future. Default: `30000` (30 s).
//!
//! ### `PROCDISPATCH_DUPLICATE_POLICY`
//!
//! What the registry does when a process name is registered twice:
//! - `overwrite` (default): the last registration wins, logged at `warn`
//! - `reject`: the second registration fails
//!
//! ### `PROCDISPATCH_STACK_SIZE`
//!
//! Stack size for broker listener coroutines. Accepts decimal (`65536`) or
//! hexadecimal (`0x10000`). Default: `0x10000` (64 KB).
//!
//! Listener coroutines run process code directly, so size this for the
//! deepest process call chain you register.
//!
//! ## Usage
//!
//! ```rust
//! use procdispatch::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Reply timeout: {:?}", config.reply_timeout);
//! ```
//!
//! Unparseable values fall back to the default.

use crate::registry::DuplicatePolicy;
use std::env;
use std::time::Duration;

pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Deadline for request-reply exchanges (default: 30 s)
    pub reply_timeout: Duration,
    /// Duplicate registration handling (default: overwrite)
    pub duplicate_policy: DuplicatePolicy,
    /// Listener coroutine stack size in bytes (default: 64 KB / 0x10000)
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_millis(DEFAULT_REPLY_TIMEOUT_MS),
            duplicate_policy: DuplicatePolicy::default(),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let reply_timeout = lookup("PROCDISPATCH_REPLY_TIMEOUT_MS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .map_or(
                Duration::from_millis(DEFAULT_REPLY_TIMEOUT_MS),
                Duration::from_millis,
            );

        let duplicate_policy = lookup("PROCDISPATCH_DUPLICATE_POLICY")
            .and_then(|val| DuplicatePolicy::parse(&val))
            .unwrap_or_default();

        let stack_size = match lookup("PROCDISPATCH_STACK_SIZE") {
            Some(val) => parse_size(&val).unwrap_or(DEFAULT_STACK_SIZE),
            None => DEFAULT_STACK_SIZE,
        };

        RuntimeConfig {
            reply_timeout,
            duplicate_policy,
            stack_size,
        }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}

// src/runtime/mod.rs

use std::time::Duration;

pub mod poller;
pub mod session;

/// Floor for task periods; `tokio::time::interval` panics on zero.
pub(crate) const MIN_PERIOD: Duration = Duration::from_millis(1);

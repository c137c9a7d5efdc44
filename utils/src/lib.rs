//! Shared utilities for the stakeview crates.

pub mod logging;
pub mod time;

pub use logging::{init_logging, LogFormat};
pub use time::{format_time_remaining, lock_progress};

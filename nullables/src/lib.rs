//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies (the clock and the chain) sit behind traits. This
//! crate provides test implementations that:
//! - return deterministic values
//! - can be scripted and inspected programmatically
//! - never touch the network
//!
//! Usage: swap the RPC-backed reader, writer and event source for a
//! [`NullChain`] and the system clock for a [`NullClock`].

pub mod chain;
pub mod clock;

pub use chain::{NullChain, STAKING_CONTRACT, TOKEN_CONTRACT};
pub use clock::NullClock;

//! Fundamental types for the stakeview client.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! 18-decimal amounts, addresses, hashes, timestamps, and the records read from
//! the staking contract (positions, contract parameters, token info, events).

pub mod address;
pub mod amount;
pub mod contract;
pub mod error;
pub mod event;
pub mod hash;
pub mod position;
pub mod time;

pub use address::Address;
pub use amount::{Amount, DECIMALS};
pub use contract::{ContractInfo, TokenInfo, UserDetails};
pub use error::{AmountError, ParseHexError};
pub use event::{EventKind, EventPayload, TransactionEvent, HISTORY_LIMIT};
pub use hash::TxHash;
pub use position::{Position, PositionStatus};
pub use time::{Clock, SystemClock, Timestamp};

//! Chain access errors.

use stakeview_types::TxHash;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The node could not be reached or answered with something that is not JSON-RPC.
    #[error("network error: {0}")]
    Network(String),

    /// The node rejected a read, or the returned data had the wrong shape.
    #[error("contract call failed: {0}")]
    ContractCall(String),

    #[error("no wallet connected")]
    NoWallet,

    #[error("transaction rejected by user")]
    UserRejected,

    #[error("transaction reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    TransactionReverted {
        tx_hash: Option<TxHash>,
        reason: Option<String>,
    },

    #[error("transaction {tx_hash} not confirmed within {waited_secs}s")]
    ConfirmationTimeout { tx_hash: TxHash, waited_secs: u64 },
}

impl ChainError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ConfirmationTimeout { .. })
    }
}

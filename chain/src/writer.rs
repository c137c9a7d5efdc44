//! Transaction submission and confirmation.
//!
//! A write has two phases, exposed separately so callers can observe them:
//! [`ChainWriter::submit`] covers the signature request and returns the
//! transaction hash, [`ChainWriter::confirm`] waits for block inclusion.
//! Once a receipt reports success the on-chain effect is final.

use std::time::{Duration, Instant};

use stakeview_types::{Address, Amount, TxHash};

use crate::abi::{self, Token};
use crate::error::ChainError;
use crate::rpc::{parse_quantity, RawReceipt, RpcClient, RpcError};

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default upper bound on waiting for a receipt.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(180);

/// One of the five state-changing calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteCall {
    /// ERC-20 `approve(spender, amount)` on the token contract.
    Approve { spender: Address, amount: Amount },
    Stake { amount: Amount },
    /// `withdraw(amount)`, or `withdraw()` for the full position.
    Withdraw { amount: Option<Amount> },
    EmergencyWithdraw,
    ClaimRewards,
}

impl WriteCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Stake { .. } => "stake",
            Self::Withdraw { .. } => "withdraw",
            Self::EmergencyWithdraw => "emergencyWithdraw",
            Self::ClaimRewards => "claimRewards",
        }
    }

    /// Whether the call goes to the token contract rather than the staking contract.
    pub fn targets_token(&self) -> bool {
        matches!(self, Self::Approve { .. })
    }

    /// ABI-encoded calldata.
    pub fn calldata(&self) -> Vec<u8> {
        match self {
            Self::Approve { spender, amount } => abi::encode_call(
                "approve(address,uint256)",
                &[Token::from(*spender), Token::from(*amount)],
            ),
            Self::Stake { amount } => abi::encode_call("stake(uint256)", &[(*amount).into()]),
            Self::Withdraw { amount: Some(amount) } => {
                abi::encode_call("withdraw(uint256)", &[(*amount).into()])
            }
            Self::Withdraw { amount: None } => abi::encode_call("withdraw()", &[]),
            Self::EmergencyWithdraw => abi::encode_call("emergencyWithdraw()", &[]),
            Self::ClaimRewards => abi::encode_call("claimRewards()", &[]),
        }
    }
}

/// A transaction ready to be signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
}

/// Outcome of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub success: bool,
}

impl TxReceipt {
    fn from_raw(raw: &RawReceipt) -> Result<Self, ChainError> {
        Ok(Self {
            tx_hash: raw.transaction_hash,
            block_number: parse_quantity(&raw.block_number)?,
            gas_used: raw
                .gas_used
                .as_deref()
                .map(parse_quantity)
                .transpose()?
                .unwrap_or(0),
            success: raw.status.as_deref() != Some("0x0"),
        })
    }
}

/// An active signing session owned by the wallet layer.
#[allow(async_fn_in_trait)]
pub trait SigningSession {
    fn address(&self) -> Address;

    /// Request a signature and broadcast. Returns the transaction hash.
    async fn send_transaction(&self, request: &TransactionRequest) -> Result<TxHash, ChainError>;
}

/// Signs through `eth_sendTransaction` with an account the node (or an
/// RPC-fronted external signer) manages.
#[derive(Clone)]
pub struct NodeSigner {
    rpc: RpcClient,
    from: Address,
}

impl NodeSigner {
    pub fn new(rpc: RpcClient, from: Address) -> Self {
        Self { rpc, from }
    }
}

impl SigningSession for NodeSigner {
    fn address(&self) -> Address {
        self.from
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<TxHash, ChainError> {
        self.rpc
            .send_transaction(&request.from, &request.to, &request.data)
            .await
            .map_err(RpcError::into_write_error)
    }
}

/// State-changing access to the staking and token contracts.
#[allow(async_fn_in_trait)]
pub trait ChainWriter {
    /// Address of the active signing session, if any.
    fn account(&self) -> Option<Address>;

    /// Ask the signer to sign and broadcast `call`.
    async fn submit(&self, call: &WriteCall) -> Result<TxHash, ChainError>;

    /// Wait until `tx_hash` is mined. A reverted transaction is an error.
    async fn confirm(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError>;
}

/// [`ChainWriter`] that polls the node for receipts.
pub struct RpcChainWriter<S> {
    rpc: RpcClient,
    session: Option<S>,
    staking_contract: Address,
    token_contract: Address,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl<S: SigningSession> RpcChainWriter<S> {
    pub fn new(
        rpc: RpcClient,
        session: Option<S>,
        staking_contract: Address,
        token_contract: Address,
    ) -> Self {
        Self {
            rpc,
            session,
            staking_contract,
            token_contract,
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_polling(mut self, poll_interval: Duration, confirmation_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.confirmation_timeout = confirmation_timeout;
        self
    }

    /// Re-run a reverted transaction as `eth_call` at its block to recover the reason.
    async fn replay_revert_reason(&self, tx_hash: &TxHash) -> Option<String> {
        let tx = self.rpc.transaction_by_hash(tx_hash).await.ok()??;
        let to = tx.to?;
        let data = abi::decode_hex_bytes(&tx.input).ok()?;
        let block = tx.block_number.unwrap_or_else(|| "latest".to_string());
        match self.rpc.call(Some(&tx.from), &to, &data, &block).await {
            Err(err @ RpcError::Node { .. }) => match err.into_write_error() {
                ChainError::TransactionReverted { reason, .. } => reason,
                _ => None,
            },
            _ => None,
        }
    }
}

impl<S: SigningSession> ChainWriter for RpcChainWriter<S> {
    fn account(&self) -> Option<Address> {
        self.session.as_ref().map(SigningSession::address)
    }

    async fn submit(&self, call: &WriteCall) -> Result<TxHash, ChainError> {
        let session = self.session.as_ref().ok_or(ChainError::NoWallet)?;
        let to = if call.targets_token() {
            self.token_contract
        } else {
            self.staking_contract
        };
        let request = TransactionRequest {
            from: session.address(),
            to,
            data: call.calldata(),
        };

        tracing::info!(call = call.name(), from = %request.from, to = %request.to, "submitting transaction");
        let tx_hash = session.send_transaction(&request).await?;
        tracing::info!(call = call.name(), %tx_hash, "transaction submitted");
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError> {
        let started = Instant::now();
        loop {
            let raw = self
                .rpc
                .transaction_receipt(tx_hash)
                .await
                .map_err(RpcError::into_read_error)?;

            if let Some(raw) = raw {
                let receipt = TxReceipt::from_raw(&raw)?;
                if receipt.success {
                    tracing::info!(%tx_hash, block = receipt.block_number, "transaction confirmed");
                    return Ok(receipt);
                }
                let reason = self.replay_revert_reason(tx_hash).await;
                tracing::warn!(%tx_hash, ?reason, "transaction reverted");
                return Err(ChainError::TransactionReverted {
                    tx_hash: Some(*tx_hash),
                    reason,
                });
            }

            if started.elapsed() >= self.confirmation_timeout {
                return Err(ChainError::ConfirmationTimeout {
                    tx_hash: *tx_hash,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

//! Staking event history.

use std::ops::RangeInclusive;
use std::sync::Arc;

use stakeview_types::{EventKind, EventPayload, TransactionEvent, HISTORY_LIMIT};

use crate::abi::{self, Decoder};
use crate::error::ChainError;
use crate::rpc::{parse_quantity, RawLog, RpcClient, RpcError};

/// Canonical event signature for `kind`. The user is the single indexed topic.
pub fn event_signature(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Staked => "Staked(address,uint256,uint256,uint256,uint256)",
        EventKind::Withdrawn => "Withdrawn(address,uint256,uint256,uint256,uint256,uint256)",
        EventKind::EmergencyWithdrawn => "EmergencyWithdrawn(address,uint256,uint256,uint256,uint256)",
        EventKind::RewardsClaimed => "RewardsClaimed(address,uint256,uint256,uint256,uint256)",
    }
}

/// Access to raw event logs of one kind.
#[allow(async_fn_in_trait)]
pub trait EventSource {
    async fn head_block(&self) -> Result<u64, ChainError>;

    /// Events of `kind` in the inclusive block range.
    async fn events(
        &self,
        kind: EventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransactionEvent>, ChainError>;
}

/// [`EventSource`] backed by `eth_getLogs` on the staking contract.
#[derive(Clone)]
pub struct RpcEventSource {
    rpc: RpcClient,
    contract: stakeview_types::Address,
}

impl RpcEventSource {
    pub fn new(rpc: RpcClient, contract: stakeview_types::Address) -> Self {
        Self { rpc, contract }
    }
}

impl EventSource for RpcEventSource {
    async fn head_block(&self) -> Result<u64, ChainError> {
        self.rpc.block_number().await
    }

    async fn events(
        &self,
        kind: EventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransactionEvent>, ChainError> {
        let topic = abi::event_topic(event_signature(kind));
        let logs = self
            .rpc
            .logs(&self.contract, &topic, from_block, to_block)
            .await
            .map_err(RpcError::into_read_error)?;
        tracing::debug!(kind = %kind, from_block, to_block, count = logs.len(), "fetched logs");

        logs.iter()
            .filter(|log| !log.removed)
            .map(|log| decode_log(kind, log))
            .collect()
    }
}

/// Decode one log of `kind` into a [`TransactionEvent`].
pub fn decode_log(kind: EventKind, log: &RawLog) -> Result<TransactionEvent, ChainError> {
    let signature = event_signature(kind);
    let user_topic = log
        .topics
        .get(1)
        .ok_or_else(|| ChainError::ContractCall(format!("{signature}: missing user topic")))?;
    let user_bytes = abi::decode_hex_bytes(user_topic)?;
    let user_word = abi::words(&user_bytes)?
        .first()
        .copied()
        .ok_or_else(|| ChainError::ContractCall(format!("{signature}: empty user topic")))?;
    let user = abi::address_from_word(&user_word)
        .ok_or_else(|| ChainError::ContractCall(format!("{signature}: user topic is not an address")))?;

    let data = abi::decode_hex_bytes(&log.data)?;
    let words = abi::words(&data)?;

    let (timestamp, payload) = match kind {
        EventKind::Staked => {
            let d = Decoder::new(&words, 4, signature)?;
            (
                d.timestamp(1)?,
                EventPayload::Staked {
                    amount: d.amount(0)?,
                    new_total_staked: d.amount(2)?,
                    current_reward_rate: d.uint(3)?,
                },
            )
        }
        EventKind::Withdrawn => {
            let d = Decoder::new(&words, 5, signature)?;
            (
                d.timestamp(1)?,
                EventPayload::Withdrawn {
                    amount: d.amount(0)?,
                    new_total_staked: d.amount(2)?,
                    current_reward_rate: d.uint(3)?,
                    rewards_accrued: d.amount(4)?,
                },
            )
        }
        EventKind::EmergencyWithdrawn => {
            let d = Decoder::new(&words, 4, signature)?;
            (
                d.timestamp(2)?,
                EventPayload::EmergencyWithdrawn {
                    amount: d.amount(0)?,
                    penalty: d.amount(1)?,
                    new_total_staked: d.amount(3)?,
                },
            )
        }
        EventKind::RewardsClaimed => {
            let d = Decoder::new(&words, 4, signature)?;
            (
                d.timestamp(1)?,
                EventPayload::RewardsClaimed {
                    amount: d.amount(0)?,
                    new_pending_rewards: d.amount(2)?,
                    total_staked: d.amount(3)?,
                },
            )
        }
    };

    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| ChainError::ContractCall(format!("{signature}: log without transaction hash")))?;
    let block_number = log.block_number.as_deref().map(parse_quantity).transpose()?.unwrap_or(0);
    let log_index = log.log_index.as_deref().map(parse_quantity).transpose()?.unwrap_or(0);

    Ok(TransactionEvent {
        tx_hash,
        user,
        timestamp,
        block_number,
        log_index,
        payload,
    })
}

/// Split `from..=to` into consecutive windows of at most `max_range` blocks.
/// Without a limit the whole range is one window; an empty range has none.
pub fn block_windows(from: u64, to: u64, max_range: Option<u64>) -> Vec<RangeInclusive<u64>> {
    if from > to {
        return Vec::new();
    }
    let step = match max_range {
        Some(n) if n > 0 => n,
        _ => return vec![from..=to],
    };

    let mut windows = Vec::new();
    let mut start = from;
    loop {
        let end = start.saturating_add(step - 1).min(to);
        windows.push(start..=end);
        if end == to {
            break;
        }
        start = end + 1;
    }
    windows
}

/// Merge event streams into one history: newest first, ties broken by block
/// number then log index (both descending), capped at [`HISTORY_LIMIT`].
pub fn merge_history(streams: Vec<Vec<TransactionEvent>>) -> Vec<TransactionEvent> {
    let mut all: Vec<TransactionEvent> = streams.into_iter().flatten().collect();
    all.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then(b.block_number.cmp(&a.block_number))
            .then(b.log_index.cmp(&a.log_index))
    });
    all.truncate(HISTORY_LIMIT);
    all
}

/// Fetches the full staking history from the deployment block to the head.
pub struct EventReader<S> {
    source: Arc<S>,
    from_block: u64,
    max_block_range: Option<u64>,
}

impl<S> Clone for EventReader<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            from_block: self.from_block,
            max_block_range: self.max_block_range,
        }
    }
}

impl<S: EventSource> EventReader<S> {
    pub fn new(source: Arc<S>, from_block: u64, max_block_range: Option<u64>) -> Self {
        Self {
            source,
            from_block,
            max_block_range,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Refetch all four streams and merge them. Any failing stream fails the call.
    pub async fn fetch_history(&self) -> Result<Vec<TransactionEvent>, ChainError> {
        let head = self.source.head_block().await?;
        let windows = block_windows(self.from_block, head, self.max_block_range);
        tracing::debug!(from = self.from_block, head, windows = windows.len(), "fetching history");

        let (staked, withdrawn, emergency, claimed) = tokio::try_join!(
            self.fetch_stream(EventKind::Staked, &windows),
            self.fetch_stream(EventKind::Withdrawn, &windows),
            self.fetch_stream(EventKind::EmergencyWithdrawn, &windows),
            self.fetch_stream(EventKind::RewardsClaimed, &windows),
        )?;

        Ok(merge_history(vec![staked, withdrawn, emergency, claimed]))
    }

    async fn fetch_stream(
        &self,
        kind: EventKind,
        windows: &[RangeInclusive<u64>],
    ) -> Result<Vec<TransactionEvent>, ChainError> {
        let mut events = Vec::new();
        for window in windows {
            let mut batch = self
                .source
                .events(kind, *window.start(), *window.end())
                .await?;
            events.append(&mut batch);
        }
        Ok(events)
    }
}

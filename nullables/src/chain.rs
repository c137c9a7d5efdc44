//! Nullable chain: an in-memory staking contract and token.
//!
//! Implements [`ChainReader`], [`ChainWriter`] and [`EventSource`] over
//! scripted state. Writes take effect when confirmed, advance the head block
//! by one and append the matching event. Every call is recorded so tests can
//! assert on what was (or was not) sent to the chain.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stakeview_chain::{ChainError, ChainReader, ChainWriter, EventSource, TxReceipt, WriteCall};
use stakeview_types::{
    Address, Amount, Clock, ContractInfo, EventKind, EventPayload, Timestamp, TransactionEvent,
    TxHash, UserDetails,
};

use crate::NullClock;

pub const STAKING_CONTRACT: Address = Address::new([0x5a; 20]);
pub const TOKEN_CONTRACT: Address = Address::new([0x70; 20]);

#[derive(Clone, Copy, Debug, Default)]
struct StakeRecord {
    staked: Amount,
    pending_rewards: Amount,
    last_stake: Timestamp,
}

#[derive(Default)]
struct State {
    signer: Option<Address>,
    info: ContractInfo,
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    stakes: HashMap<Address, StakeRecord>,
    events: Vec<TransactionEvent>,
    head_block: u64,
    next_tx: u64,
    pending: HashMap<TxHash, (Address, WriteCall)>,

    read_calls: Vec<&'static str>,
    writes: Vec<WriteCall>,
    confirmed: Vec<TxHash>,

    read_failures: VecDeque<ChainError>,
    event_failure: Option<ChainError>,
    submit_failure: Option<ChainError>,
    revert_reason: Option<Option<String>>,
}

/// A scripted in-memory chain.
pub struct NullChain {
    clock: Arc<NullClock>,
    state: Mutex<State>,
}

impl NullChain {
    pub fn new(clock: Arc<NullClock>) -> Self {
        Self {
            clock,
            state: Mutex::new(State {
                head_block: 1,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clock(&self) -> &Arc<NullClock> {
        &self.clock
    }

    // ---- scripting ----

    /// Install (or remove) the signing account.
    pub fn set_signer(&self, signer: Option<Address>) {
        self.state().signer = signer;
    }

    pub fn set_contract_info(&self, info: ContractInfo) {
        self.state().info = info;
    }

    pub fn set_balance(&self, owner: Address, amount: Amount) {
        self.state().balances.insert(owner, amount);
    }

    /// Allowance of `owner` toward the staking contract.
    pub fn set_allowance(&self, owner: Address, amount: Amount) {
        self.state()
            .allowances
            .insert((owner, STAKING_CONTRACT), amount);
    }

    /// Seed a stake directly, adjusting the contract total.
    pub fn set_stake(&self, user: Address, staked: Amount, last_stake: Timestamp) {
        let mut state = self.state();
        let record = state.stakes.entry(user).or_default();
        let previous = record.staked;
        record.staked = staked;
        record.last_stake = last_stake;
        state.info.total_staked = state
            .info
            .total_staked
            .saturating_sub(previous)
            .saturating_add(staked);
    }

    pub fn set_pending_rewards(&self, user: Address, rewards: Amount) {
        self.state().stakes.entry(user).or_default().pending_rewards = rewards;
    }

    pub fn push_event(&self, event: TransactionEvent) {
        let mut state = self.state();
        state.head_block = state.head_block.max(event.block_number);
        state.events.push(event);
    }

    pub fn set_head_block(&self, block: u64) {
        self.state().head_block = block;
    }

    /// Fail the next `times` reader calls with `error`.
    pub fn fail_reads(&self, error: ChainError, times: usize) {
        let mut state = self.state();
        for _ in 0..times {
            state.read_failures.push_back(error.clone());
        }
    }

    /// Fail every event query with `error` until cleared with `None`.
    pub fn fail_events(&self, error: Option<ChainError>) {
        self.state().event_failure = error;
    }

    /// Fail the next submission (e.g. [`ChainError::UserRejected`]).
    pub fn fail_next_submit(&self, error: ChainError) {
        self.state().submit_failure = Some(error);
    }

    /// Mine the next confirmed transaction with status 0.
    pub fn revert_next(&self, reason: Option<&str>) {
        self.state().revert_reason = Some(reason.map(str::to_string));
    }

    // ---- inspection ----

    /// Reader and event-source calls in order.
    pub fn read_calls(&self) -> Vec<&'static str> {
        self.state().read_calls.clone()
    }

    pub fn clear_read_calls(&self) {
        self.state().read_calls.clear();
    }

    /// Every submitted write call, including ones that later failed.
    pub fn writes(&self) -> Vec<WriteCall> {
        self.state().writes.clone()
    }

    pub fn confirmed(&self) -> Vec<TxHash> {
        self.state().confirmed.clone()
    }

    pub fn balance(&self, owner: &Address) -> Amount {
        self.state().balances.get(owner).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: &Address) -> Amount {
        allowance_of(&self.state(), owner)
    }

    pub fn staked(&self, user: &Address) -> Amount {
        self.state()
            .stakes
            .get(user)
            .map(|s| s.staked)
            .unwrap_or_default()
    }

    pub fn total_staked(&self) -> Amount {
        self.state().info.total_staked
    }

    fn begin_read(&self, name: &'static str) -> Result<MutexGuard<'_, State>, ChainError> {
        let mut state = self.state();
        state.read_calls.push(name);
        match state.read_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }

    fn details(&self, state: &State, user: &Address) -> UserDetails {
        let record = state.stakes.get(user).copied().unwrap_or_default();
        let remaining = unlock_remaining(state, &record, self.clock.now());
        UserDetails {
            staked_amount: record.staked,
            last_stake_timestamp: record.last_stake,
            pending_rewards: record.pending_rewards,
            time_until_unlock: remaining,
            can_withdraw: !record.staked.is_zero() && remaining == 0,
        }
    }
}

fn allowance_of(state: &State, owner: &Address) -> Amount {
    state
        .allowances
        .get(&(*owner, STAKING_CONTRACT))
        .copied()
        .unwrap_or_default()
}

fn unlock_remaining(state: &State, record: &StakeRecord, now: Timestamp) -> u64 {
    if record.staked.is_zero() {
        return 0;
    }
    record
        .last_stake
        .plus_secs(state.info.min_lock_duration)
        .as_secs()
        .saturating_sub(now.as_secs())
}

fn reverted(reason: &str) -> ChainError {
    ChainError::TransactionReverted {
        tx_hash: None,
        reason: Some(reason.to_string()),
    }
}

impl ChainReader for NullChain {
    async fn token_balance(&self, owner: &Address) -> Result<Amount, ChainError> {
        let state = self.begin_read("token_balance")?;
        Ok(state.balances.get(owner).copied().unwrap_or_default())
    }

    async fn token_allowance(
        &self,
        owner: &Address,
        spender: &Address,
    ) -> Result<Amount, ChainError> {
        let state = self.begin_read("token_allowance")?;
        Ok(state
            .allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or_default())
    }

    async fn contract_info(&self) -> Result<ContractInfo, ChainError> {
        let state = self.begin_read("contract_info")?;
        Ok(state.info.clone())
    }

    async fn user_details(&self, user: &Address) -> Result<UserDetails, ChainError> {
        let state = self.begin_read("user_details")?;
        Ok(self.details(&state, user))
    }

    async fn pending_rewards(&self, user: &Address) -> Result<Amount, ChainError> {
        let state = self.begin_read("pending_rewards")?;
        Ok(self.details(&state, user).pending_rewards)
    }

    async fn time_until_unlock(&self, user: &Address) -> Result<u64, ChainError> {
        let state = self.begin_read("time_until_unlock")?;
        Ok(self.details(&state, user).time_until_unlock)
    }
}

impl ChainWriter for NullChain {
    fn account(&self) -> Option<Address> {
        self.state().signer
    }

    async fn submit(&self, call: &WriteCall) -> Result<TxHash, ChainError> {
        let mut state = self.state();
        let from = state.signer.ok_or(ChainError::NoWallet)?;
        state.writes.push(call.clone());
        if let Some(error) = state.submit_failure.take() {
            return Err(error);
        }

        state.next_tx += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&state.next_tx.to_be_bytes());
        let tx_hash = TxHash::new(bytes);
        state.pending.insert(tx_hash, (from, call.clone()));
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError> {
        let now = self.clock.now();
        let mut state = self.state();
        let (from, call) = state
            .pending
            .remove(tx_hash)
            .ok_or(ChainError::ConfirmationTimeout {
                tx_hash: *tx_hash,
                waited_secs: 0,
            })?;

        state.head_block += 1;
        let block_number = state.head_block;

        let outcome = match state.revert_reason.take() {
            Some(reason) => Err(ChainError::TransactionReverted {
                tx_hash: None,
                reason,
            }),
            None => apply(&mut state, from, &call, now),
        };
        let payload = outcome.map_err(|err| match err {
            ChainError::TransactionReverted { reason, .. } => ChainError::TransactionReverted {
                tx_hash: Some(*tx_hash),
                reason,
            },
            other => other,
        })?;

        if let Some(payload) = payload {
            let log_index = state.events.len() as u64;
            state.events.push(TransactionEvent {
                tx_hash: *tx_hash,
                user: from,
                timestamp: now,
                block_number,
                log_index,
                payload,
            });
        }
        state.confirmed.push(*tx_hash);

        Ok(TxReceipt {
            tx_hash: *tx_hash,
            block_number,
            gas_used: 21_000,
            success: true,
        })
    }
}

/// Apply a confirmed write the way the contract would, returning the emitted
/// event payload (approvals emit none that the history tracks).
fn apply(
    state: &mut State,
    from: Address,
    call: &WriteCall,
    now: Timestamp,
) -> Result<Option<EventPayload>, ChainError> {
    if state.info.paused && !matches!(call, WriteCall::Approve { .. }) {
        return Err(reverted("Pausable: paused"));
    }

    match call {
        WriteCall::Approve { spender, amount } => {
            state.allowances.insert((from, *spender), *amount);
            Ok(None)
        }
        WriteCall::Stake { amount } => {
            if amount.is_zero() {
                return Err(reverted("Cannot stake 0"));
            }
            let allowance = allowance_of(state, &from);
            let balance = state.balances.get(&from).copied().unwrap_or_default();
            if *amount > allowance {
                return Err(reverted("ERC20: insufficient allowance"));
            }
            if *amount > balance {
                return Err(reverted("ERC20: transfer amount exceeds balance"));
            }
            state
                .allowances
                .insert((from, STAKING_CONTRACT), allowance.saturating_sub(*amount));
            state.balances.insert(from, balance.saturating_sub(*amount));

            let record = state.stakes.entry(from).or_default();
            record.staked = record.staked.saturating_add(*amount);
            record.last_stake = now;
            state.info.total_staked = state.info.total_staked.saturating_add(*amount);

            Ok(Some(EventPayload::Staked {
                amount: *amount,
                new_total_staked: state.info.total_staked,
                current_reward_rate: state.info.current_reward_rate,
            }))
        }
        WriteCall::Withdraw { amount } => {
            let record = state.stakes.get(&from).copied().unwrap_or_default();
            if record.staked.is_zero() {
                return Err(reverted("No stake found"));
            }
            if unlock_remaining(state, &record, now) > 0 {
                return Err(reverted("Lock period not ended"));
            }
            let amount = amount.unwrap_or(record.staked);
            if amount > record.staked {
                return Err(reverted("Insufficient staked amount"));
            }

            let rewards = record.pending_rewards;
            let entry = state.stakes.entry(from).or_default();
            entry.staked = entry.staked.saturating_sub(amount);
            entry.pending_rewards = Amount::ZERO;
            credit(state, from, amount.saturating_add(rewards));
            state.info.total_staked = state.info.total_staked.saturating_sub(amount);

            Ok(Some(EventPayload::Withdrawn {
                amount,
                new_total_staked: state.info.total_staked,
                current_reward_rate: state.info.current_reward_rate,
                rewards_accrued: rewards,
            }))
        }
        WriteCall::EmergencyWithdraw => {
            let record = state.stakes.get(&from).copied().unwrap_or_default();
            if record.staked.is_zero() {
                return Err(reverted("No stake found"));
            }
            let penalty = Amount::from_raw(
                record.staked.raw() / 100 * u128::from(state.info.emergency_withdraw_penalty),
            );
            let returned = record.staked.saturating_sub(penalty);

            let entry = state.stakes.entry(from).or_default();
            entry.staked = Amount::ZERO;
            entry.pending_rewards = Amount::ZERO;
            credit(state, from, returned);
            state.info.total_staked = state.info.total_staked.saturating_sub(record.staked);

            Ok(Some(EventPayload::EmergencyWithdrawn {
                amount: returned,
                penalty,
                new_total_staked: state.info.total_staked,
            }))
        }
        WriteCall::ClaimRewards => {
            let rewards = state
                .stakes
                .get(&from)
                .map(|s| s.pending_rewards)
                .unwrap_or_default();
            if rewards.is_zero() {
                return Err(reverted("No rewards to claim"));
            }
            state.stakes.entry(from).or_default().pending_rewards = Amount::ZERO;
            credit(state, from, rewards);

            Ok(Some(EventPayload::RewardsClaimed {
                amount: rewards,
                new_pending_rewards: Amount::ZERO,
                total_staked: state.info.total_staked,
            }))
        }
    }
}

fn credit(state: &mut State, to: Address, amount: Amount) {
    let balance = state.balances.entry(to).or_default();
    *balance = balance.saturating_add(amount);
}

impl EventSource for NullChain {
    async fn head_block(&self) -> Result<u64, ChainError> {
        let mut state = self.state();
        state.read_calls.push("head_block");
        Ok(state.head_block)
    }

    async fn events(
        &self,
        kind: EventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransactionEvent>, ChainError> {
        let mut state = self.state();
        state.read_calls.push("events");
        if let Some(error) = state.event_failure.clone() {
            return Err(error);
        }
        Ok(state
            .events
            .iter()
            .filter(|e| e.kind() == kind && (from_block..=to_block).contains(&e.block_number))
            .cloned()
            .collect())
    }
}

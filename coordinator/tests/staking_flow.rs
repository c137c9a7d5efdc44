use std::sync::{Arc, Mutex};
use std::time::Duration;

use stakeview_chain::{ChainError, ChainWriter, EventReader, TxReceipt, WriteCall};
use stakeview_coordinator::{
    ActionKind, ActionPhase, CoordinatorError, RefreshPolicy, StakingCoordinator, StakingEvent,
};
use stakeview_nullables::{NullChain, NullClock, STAKING_CONTRACT};
use stakeview_types::{Address, Amount, ContractInfo, EventKind, PositionStatus, Timestamp, TxHash};
use stakeview_views::{filter_by_user, RefreshOutcome};
use tokio::sync::Notify;

const USER: Address = Address::new([0x11; 20]);
const START: u64 = 1_700_000_000;
const WEEK: u64 = 7 * 86_400;

fn tokens(s: &str) -> Amount {
    Amount::parse(s).unwrap()
}

fn no_backoff() -> RefreshPolicy {
    RefreshPolicy {
        attempts: 3,
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
    }
}

fn chain(clock: &Arc<NullClock>) -> Arc<NullChain> {
    let chain = Arc::new(NullChain::new(Arc::clone(clock)));
    chain.set_contract_info(ContractInfo {
        initial_apr: tokens("10"),
        apr_reduction_per_thousand: tokens("0.5"),
        min_lock_duration: WEEK,
        emergency_withdraw_penalty: 10,
        current_reward_rate: 1_000,
        ..ContractInfo::default()
    });
    chain.set_balance(USER, tokens("1000"));
    chain.set_signer(Some(USER));
    chain
}

type Coordinator = StakingCoordinator<NullChain, NullChain, NullChain>;

fn harness() -> (Arc<NullClock>, Arc<NullChain>, Coordinator) {
    let clock = Arc::new(NullClock::new(START));
    let chain = chain(&clock);
    let events = EventReader::new(Arc::clone(&chain), 0, Some(1_000));
    let coordinator = StakingCoordinator::new(
        Arc::clone(&chain),
        Arc::clone(&chain),
        events,
        clock.clone(),
        STAKING_CONTRACT,
    )
    .with_refresh_policy(no_backoff());
    (clock, chain, coordinator)
}

fn record<R, W, E>(coordinator: &StakingCoordinator<R, W, E>) -> Arc<Mutex<Vec<StakingEvent>>>
where
    R: stakeview_chain::ChainReader,
    W: ChainWriter,
    E: stakeview_chain::EventSource,
{
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    coordinator.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

fn phases(events: &[StakingEvent], kind: ActionKind) -> Vec<ActionPhase> {
    events
        .iter()
        .filter_map(|e| match e {
            StakingEvent::PhaseChanged { action, phase } if *action == kind => Some(*phase),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn disconnected_shows_defaults_without_touching_the_chain() {
    let (_, chain, coordinator) = harness();
    chain.set_signer(None);

    let report = coordinator.sync_account().await;
    assert_eq!(report.token, RefreshOutcome::Skipped);
    assert_eq!(report.contract, RefreshOutcome::Skipped);
    assert_eq!(report.position, RefreshOutcome::Skipped);
    assert!(chain.read_calls().is_empty());

    let summary = coordinator.summary().await;
    assert_eq!(summary.account, None);
    assert_eq!(summary.balance, Amount::ZERO);
    assert_eq!(summary.total_staked, Amount::ZERO);
    assert_eq!(summary.lock_progress, None);
    assert_eq!(coordinator.token().error().await, None);
    assert_eq!(coordinator.position().error().await, None);

    let err = coordinator.stake("1").await.unwrap_err();
    assert_eq!(err, CoordinatorError::Chain(ChainError::NoWallet));
    assert!(chain.writes().is_empty());
    assert!(chain.read_calls().is_empty());
}

#[tokio::test]
async fn stake_over_allowance_never_reaches_the_writer() {
    let (_, chain, coordinator) = harness();
    chain.set_allowance(USER, tokens("50"));
    coordinator.sync_account().await;
    let events = record(&coordinator);

    assert!(coordinator.needs_approval("100").await.unwrap());
    assert!(!coordinator.needs_approval("50").await.unwrap());

    let err = coordinator.stake("100").await.unwrap_err();
    assert_eq!(
        err,
        CoordinatorError::InsufficientAllowance {
            required: tokens("100"),
            allowance: tokens("50"),
        }
    );
    assert!(chain.writes().is_empty());
    assert_eq!(coordinator.action_phase(ActionKind::Stake), ActionPhase::Idle);

    let events = events.lock().unwrap();
    assert!(phases(&events, ActionKind::Stake).is_empty());
    assert!(events.iter().any(|e| matches!(
        e,
        StakingEvent::Error { action: ActionKind::Stake, error: CoordinatorError::InsufficientAllowance { .. } }
    )));
}

#[tokio::test]
async fn stake_writes_once_then_refreshes_dependent_views() {
    let (_, chain, coordinator) = harness();
    chain.set_allowance(USER, tokens("150"));
    coordinator.sync_account().await;
    chain.clear_read_calls();
    let events = record(&coordinator);

    let optimistic = coordinator.stake("100").await.unwrap();
    assert_eq!(optimistic.status, PositionStatus::Pending);
    assert_eq!(optimistic.amount, tokens("100"));
    assert_eq!(optimistic.end_time, Timestamp::new(START + WEEK));

    assert_eq!(
        chain.writes(),
        vec![WriteCall::Stake {
            amount: Amount::from_raw(100 * 10u128.pow(18))
        }]
    );

    let reads = chain.read_calls();
    for call in ["token_balance", "token_allowance", "contract_info", "user_details"] {
        assert!(reads.contains(&call), "missing {call} in {reads:?}");
    }

    let token = coordinator.token().value_or_default().await;
    assert_eq!(token.balance, tokens("900"));
    assert_eq!(token.allowance, tokens("50"));
    assert_eq!(coordinator.contract().value_or_default().await.total_staked, tokens("100"));

    let position = coordinator.position().value_or_default().await.unwrap();
    assert_eq!(position.status, PositionStatus::Pending);
    assert_eq!(position.amount, tokens("100"));
    assert!(!position.can_withdraw);

    let events = events.lock().unwrap();
    assert_eq!(
        phases(&events, ActionKind::Stake),
        vec![
            ActionPhase::Submitting,
            ActionPhase::Confirming,
            ActionPhase::Succeeded,
            ActionPhase::Idle
        ]
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, StakingEvent::Staked { amount, .. } if *amount == tokens("100"))));
}

#[tokio::test]
async fn emergency_withdraw_clears_the_position() {
    let (_, chain, coordinator) = harness();
    chain.set_allowance(USER, tokens("1000"));
    coordinator.sync_account().await;
    coordinator.stake("100").await.unwrap();

    coordinator.emergency_withdraw().await.unwrap();

    assert_eq!(coordinator.position().value().await, Some(None));
    let summary = coordinator.summary().await;
    assert_eq!(summary.user_stake, Amount::ZERO);
    assert_eq!(summary.balance, tokens("990"));
    assert_eq!(summary.total_staked, Amount::ZERO);
}

#[tokio::test]
async fn locked_withdraw_reverts_with_reason_then_succeeds_after_maturity() {
    let (clock, chain, coordinator) = harness();
    chain.set_stake(USER, tokens("100"), Timestamp::new(START));
    coordinator.sync_account().await;

    let err = coordinator.withdraw(None).await.unwrap_err();
    match err {
        CoordinatorError::Chain(ChainError::TransactionReverted { tx_hash, reason }) => {
            assert!(tx_hash.is_some());
            assert_eq!(reason.as_deref(), Some("Lock period not ended"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(coordinator.action_phase(ActionKind::Withdraw), ActionPhase::Idle);

    clock.advance(WEEK);
    coordinator.refresh_all().await;
    let summary = coordinator.summary().await;
    assert_eq!(summary.lock_label, Some("Unlocked"));
    assert_eq!(summary.lock_progress, Some(100));

    coordinator.withdraw(Some("40")).await.unwrap();
    assert_eq!(chain.staked(&USER), tokens("60"));
    coordinator.withdraw(None).await.unwrap();
    assert!(chain.staked(&USER).is_zero());
    assert_eq!(coordinator.position().value().await, Some(None));
}

#[tokio::test]
async fn rejected_signature_reports_error_and_skips_refresh() {
    let (_, chain, coordinator) = harness();
    chain.set_allowance(USER, tokens("100"));
    coordinator.sync_account().await;
    chain.clear_read_calls();
    chain.fail_next_submit(ChainError::UserRejected);
    let events = record(&coordinator);

    let err = coordinator.stake("100").await.unwrap_err();
    assert_eq!(err, CoordinatorError::Chain(ChainError::UserRejected));
    assert!(chain.read_calls().is_empty());
    assert_eq!(coordinator.position().value().await, Some(None));

    let events = events.lock().unwrap();
    assert_eq!(
        phases(&events, ActionKind::Stake),
        vec![ActionPhase::Submitting, ActionPhase::Failed, ActionPhase::Idle]
    );
    assert!(events.contains(&StakingEvent::Error {
        action: ActionKind::Stake,
        error: CoordinatorError::Chain(ChainError::UserRejected),
    }));
}

#[tokio::test]
async fn claim_returns_the_reward_shown_before_submission() {
    let (_, chain, coordinator) = harness();
    chain.set_stake(USER, tokens("100"), Timestamp::new(START));
    chain.set_pending_rewards(USER, tokens("12.5"));
    coordinator.sync_account().await;

    let position = coordinator.position().value_or_default().await.unwrap();
    assert_eq!(position.reward, tokens("12.5"));

    let claimed = coordinator.claim_rewards().await.unwrap();
    assert_eq!(claimed, tokens("12.5"));
    assert_eq!(chain.balance(&USER), tokens("1012.5"));
    let position = coordinator.position().value_or_default().await.unwrap();
    assert_eq!(position.reward, Amount::ZERO);
    assert_eq!(position.amount, tokens("100"));
}

#[tokio::test]
async fn rewards_left_after_full_withdrawal_show_no_position() {
    let (clock, chain, coordinator) = harness();
    chain.set_stake(USER, tokens("100"), Timestamp::new(START));
    clock.advance(WEEK);
    coordinator.sync_account().await;

    coordinator.withdraw(None).await.unwrap();
    chain.set_pending_rewards(USER, tokens("4"));
    coordinator.refresh_all().await;

    assert_eq!(coordinator.position().value().await, Some(None));
    assert_eq!(coordinator.summary().await.pending_rewards, Amount::ZERO);
}

#[tokio::test]
async fn approve_refreshes_allowance() {
    let (_, chain, coordinator) = harness();
    coordinator.sync_account().await;
    assert!(coordinator.needs_approval("10").await.unwrap());

    coordinator.approve("250").await.unwrap();
    assert_eq!(
        chain.writes(),
        vec![WriteCall::Approve {
            spender: STAKING_CONTRACT,
            amount: tokens("250")
        }]
    );
    assert_eq!(coordinator.token().value_or_default().await.allowance, tokens("250"));
    assert!(!coordinator.needs_approval("10").await.unwrap());
}

#[tokio::test]
async fn invalid_amounts_are_validation_errors() {
    let (_, chain, coordinator) = harness();
    coordinator.sync_account().await;
    let events = record(&coordinator);
    for input in ["", "abc", "0", "1.0000000000000000001"] {
        assert!(matches!(
            coordinator.approve(input).await,
            Err(CoordinatorError::Validation(_))
        ));
    }
    assert!(matches!(
        coordinator.withdraw(Some("-1")).await,
        Err(CoordinatorError::Validation(_))
    ));
    assert!(chain.writes().is_empty());

    // Rejected input never enters the submitting phase.
    let events = events.lock().unwrap();
    assert!(phases(&events, ActionKind::Approve).is_empty());
    assert!(phases(&events, ActionKind::Withdraw).is_empty());
    let errors = events
        .iter()
        .filter(|e| matches!(e, StakingEvent::Error { error: CoordinatorError::Validation(_), .. }))
        .count();
    assert_eq!(errors, 5);
}

#[tokio::test]
async fn switching_signer_rechecks_allowance_for_the_new_account() {
    const OTHER: Address = Address::new([0x22; 20]);
    let (_, chain, coordinator) = harness();
    chain.set_allowance(USER, tokens("1000"));
    chain.set_balance(OTHER, tokens("500"));
    coordinator.sync_account().await;
    assert!(!coordinator.needs_approval("100").await.unwrap());

    chain.set_signer(Some(OTHER));
    assert!(coordinator.needs_approval("100").await.unwrap());
    assert_eq!(coordinator.token().account().await, Some(OTHER));

    let err = coordinator.stake("100").await.unwrap_err();
    assert_eq!(
        err,
        CoordinatorError::InsufficientAllowance {
            required: tokens("100"),
            allowance: Amount::ZERO,
        }
    );
    assert!(chain.writes().is_empty());

    let summary = coordinator.summary().await;
    assert_eq!(summary.account, Some(OTHER));
    assert_eq!(summary.balance, tokens("500"));
}

#[tokio::test]
async fn stake_without_prior_sync_loads_the_account_first() {
    let (_, chain, coordinator) = harness();
    chain.set_allowance(USER, tokens("100"));

    coordinator.stake("100").await.unwrap();
    assert_eq!(chain.staked(&USER), tokens("100"));
    assert_eq!(coordinator.position().account().await, Some(USER));
}

#[tokio::test]
async fn failed_refresh_is_retried_then_reported() {
    let (_, chain, coordinator) = harness();
    chain.set_allowance(USER, tokens("5"));
    coordinator.sync_account().await;
    let events = record(&coordinator);

    chain.fail_reads(ChainError::Network("flaky".into()), 1);
    assert!(coordinator.refresh_all().await.all_updated());
    assert!(events.lock().unwrap().is_empty());

    chain.fail_reads(ChainError::Network("down".into()), 100);
    let report = coordinator.refresh_all().await;
    assert_eq!(report.failures().len(), 3);

    // Previous values survive, errors are in the slots.
    assert_eq!(coordinator.token().value_or_default().await.allowance, tokens("5"));
    assert_eq!(
        coordinator.token().error().await,
        Some(ChainError::Network("down".into()))
    );
    let failed_views: Vec<&str> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            StakingEvent::RefreshFailed { view, .. } => Some(*view),
            _ => None,
        })
        .collect();
    assert_eq!(failed_views, vec!["token", "contract", "position"]);
}

#[tokio::test]
async fn history_lists_confirmed_actions_newest_first() {
    let (clock, chain, coordinator) = harness();
    chain.set_allowance(USER, tokens("1000"));
    chain.set_balance(Address::new([0x22; 20]), tokens("5"));
    coordinator.sync_account().await;

    coordinator.stake("100").await.unwrap();
    clock.advance(60);
    coordinator.emergency_withdraw().await.unwrap();

    assert!(coordinator.refresh_history().await.is_updated());
    let history = coordinator.history().value_or_default().await;
    let kinds: Vec<EventKind> = history.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec![EventKind::EmergencyWithdrawn, EventKind::Staked]);
    assert_eq!(filter_by_user(&history, &USER).count(), 2);
    assert_eq!(filter_by_user(&history, &Address::new([0x22; 20])).count(), 0);
}

#[tokio::test]
async fn unsubscribed_listener_stops_receiving() {
    let (_, chain, coordinator) = harness();
    chain.set_allowance(USER, tokens("1"));
    coordinator.sync_account().await;

    let events = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&events);
    let id = coordinator.subscribe(move |_| *sink.lock().unwrap() += 1);
    coordinator.approve("1").await.unwrap();
    let seen = *events.lock().unwrap();
    assert!(seen > 0);

    assert!(coordinator.unsubscribe(id));
    coordinator.approve("2").await.unwrap();
    assert_eq!(*events.lock().unwrap(), seen);
}

/// Holds every confirmation until released.
struct GatedWriter {
    chain: Arc<NullChain>,
    gate: Notify,
}

impl ChainWriter for GatedWriter {
    fn account(&self) -> Option<Address> {
        self.chain.account()
    }

    async fn submit(&self, call: &WriteCall) -> Result<TxHash, ChainError> {
        self.chain.submit(call).await
    }

    async fn confirm(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError> {
        self.gate.notified().await;
        self.chain.confirm(tx_hash).await
    }
}

#[tokio::test]
async fn second_call_while_confirming_is_refused() {
    let clock = Arc::new(NullClock::new(START));
    let chain = chain(&clock);
    chain.set_stake(USER, tokens("10"), Timestamp::new(START));
    chain.set_pending_rewards(USER, tokens("3"));
    let writer = Arc::new(GatedWriter {
        chain: Arc::clone(&chain),
        gate: Notify::new(),
    });
    let coordinator = StakingCoordinator::new(
        Arc::clone(&chain),
        Arc::clone(&writer),
        EventReader::new(Arc::clone(&chain), 0, None),
        clock.clone(),
        STAKING_CONTRACT,
    )
    .with_refresh_policy(no_backoff());
    coordinator.sync_account().await;

    let (first, second) = tokio::join!(coordinator.claim_rewards(), async {
        tokio::task::yield_now().await;
        assert_eq!(
            coordinator.action_phase(ActionKind::ClaimRewards),
            ActionPhase::Confirming
        );
        let second = coordinator.claim_rewards().await;
        writer.gate.notify_one();
        second
    });

    assert_eq!(first.unwrap(), tokens("3"));
    assert_eq!(
        second.unwrap_err(),
        CoordinatorError::ActionInProgress(ActionKind::ClaimRewards)
    );
    assert_eq!(chain.writes().len(), 1);
    assert_eq!(coordinator.action_phase(ActionKind::ClaimRewards), ActionPhase::Idle);
}

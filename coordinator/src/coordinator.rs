//! The staking coordinator façade.

use std::sync::Arc;

use stakeview_chain::{ChainError, ChainReader, ChainWriter, EventReader, EventSource, TxReceipt, WriteCall};
use stakeview_types::{Address, Amount, Clock, Position};
use stakeview_views::{
    ContractSource, ContractView, HistorySource, HistoryView, PositionSource, PositionView,
    RefreshOutcome, TokenSource, TokenView,
};

use crate::action::{ActionGuard, ActionKind, ActionPhase, ActionSlots};
use crate::error::CoordinatorError;
use crate::listener::{ListenerRegistry, StakingEvent, SubscriptionId};
use crate::metrics::DashboardSummary;
use crate::retry::RefreshPolicy;

/// Outcome of refreshing the Token, Contract and Position views together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshReport {
    pub token: RefreshOutcome,
    pub contract: RefreshOutcome,
    pub position: RefreshOutcome,
}

impl RefreshReport {
    pub fn outcomes(&self) -> [(&'static str, &RefreshOutcome); 3] {
        [
            ("token", &self.token),
            ("contract", &self.contract),
            ("position", &self.position),
        ]
    }

    pub fn all_updated(&self) -> bool {
        self.outcomes().iter().all(|(_, o)| o.is_updated())
    }

    pub fn failures(&self) -> Vec<(&'static str, &ChainError)> {
        self.outcomes()
            .into_iter()
            .filter_map(|(name, outcome)| outcome.error().map(|err| (name, err)))
            .collect()
    }
}

/// Composes the views with the chain writer and sequences staking actions.
///
/// Reads go through the views; every write runs in its action slot,
/// and once the receipt is observed the dependent views are refreshed
/// concurrently under the [`RefreshPolicy`].
pub struct StakingCoordinator<R: ChainReader, W, E: EventSource> {
    writer: Arc<W>,
    token: TokenView<R>,
    contract: ContractView<R>,
    position: PositionView<R>,
    history: HistoryView<E>,
    clock: Arc<dyn Clock>,
    staking_contract: Address,
    refresh_policy: RefreshPolicy,
    actions: ActionSlots,
    listeners: ListenerRegistry,
}

impl<R, W, E> StakingCoordinator<R, W, E>
where
    R: ChainReader,
    W: ChainWriter,
    E: EventSource,
{
    pub fn new(
        reader: Arc<R>,
        writer: Arc<W>,
        events: EventReader<E>,
        clock: Arc<dyn Clock>,
        staking_contract: Address,
    ) -> Self {
        Self {
            writer,
            token: TokenView::new(
                TokenSource::new(Arc::clone(&reader), staking_contract),
                Arc::clone(&clock),
            ),
            contract: ContractView::new(ContractSource::new(Arc::clone(&reader)), Arc::clone(&clock)),
            position: PositionView::new(
                PositionSource::new(reader, Arc::clone(&clock)),
                Arc::clone(&clock),
            ),
            history: HistoryView::new(HistorySource::new(events), Arc::clone(&clock)),
            clock,
            staking_contract,
            refresh_policy: RefreshPolicy::default(),
            actions: ActionSlots::default(),
            listeners: ListenerRegistry::default(),
        }
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn token(&self) -> &TokenView<R> {
        &self.token
    }

    pub fn contract(&self) -> &ContractView<R> {
        &self.contract
    }

    pub fn position(&self) -> &PositionView<R> {
        &self.position
    }

    pub fn history(&self) -> &HistoryView<E> {
        &self.history
    }

    /// Address of the signing session, if one is active.
    pub fn account(&self) -> Option<Address> {
        self.writer.account()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&StakingEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn action_phase(&self, kind: ActionKind) -> ActionPhase {
        self.actions.phase(kind)
    }

    /// Key the Token, Contract and Position views to the signing session's
    /// account. Views whose account changed run their initial load
    /// concurrently. History is only loaded by [`Self::refresh_history`].
    pub async fn sync_account(&self) -> RefreshReport {
        let account = self.writer.account();
        tracing::debug!(account = ?account, "syncing account");
        let (token, contract, position) = tokio::join!(
            self.token.set_account(account),
            self.contract.set_account(account),
            self.position.set_account(account),
        );
        let report = RefreshReport {
            token,
            contract,
            position,
        };
        self.report_failures(&report);
        report
    }

    /// Refresh Token, Contract and Position concurrently, retrying each
    /// failure under the refresh policy. Views still keyed to a previous
    /// signing account are re-keyed first.
    pub async fn refresh_all(&self) -> RefreshReport {
        self.follow_account().await;
        let policy = self.refresh_policy;
        let (token, contract, position) = (&self.token, &self.contract, &self.position);
        let (token, contract, position) = tokio::join!(
            policy.run("token", move || token.refresh()),
            policy.run("contract", move || contract.refresh()),
            policy.run("position", move || position.refresh()),
        );
        let report = RefreshReport {
            token,
            contract,
            position,
        };
        self.report_failures(&report);
        report
    }

    /// Full refetch of the event history.
    pub async fn refresh_history(&self) -> RefreshOutcome {
        let history = &self.history;
        let outcome = self
            .refresh_policy
            .run("history", move || history.refresh())
            .await;
        if let Some(err) = outcome.error() {
            self.listeners.emit(&StakingEvent::RefreshFailed {
                view: "history",
                error: err.clone(),
            });
        }
        outcome
    }

    /// Re-key the views when the writer's account differs from the one
    /// they were loaded for.
    async fn follow_account(&self) {
        let account = self.writer.account();
        if self.token.account().await != account {
            tracing::info!(account = ?account, "signing account changed");
            self.sync_account().await;
        }
    }

    fn report_failures(&self, report: &RefreshReport) {
        for (view, err) in report.failures() {
            self.listeners.emit(&StakingEvent::RefreshFailed {
                view,
                error: err.clone(),
            });
        }
    }

    /// Whether staking `amount` needs an approval first.
    pub async fn needs_approval(&self, amount: &str) -> Result<bool, CoordinatorError> {
        let amount = Amount::parse(amount)?;
        self.follow_account().await;
        Ok(self.token.value_or_default().await.needs_approval(amount))
    }

    /// Approve the staking contract to transfer `amount`. Refreshes the Token view.
    pub async fn approve(&self, amount: &str) -> Result<TxReceipt, CoordinatorError> {
        let amount = self
            .require_account()
            .and_then(|_| positive_amount(amount))
            .map_err(|err| self.reject(ActionKind::Approve, err))?;
        let mut action = self.actions.begin(ActionKind::Approve, &self.listeners)?;

        let call = WriteCall::Approve {
            spender: self.staking_contract,
            amount,
        };
        let receipt = self.execute(&mut action, &call).await?;
        self.listeners.emit(&StakingEvent::Approved {
            tx_hash: receipt.tx_hash,
            amount,
        });

        self.follow_account().await;
        let token = &self.token;
        let outcome = self.refresh_policy.run("token", move || token.refresh()).await;
        if let Some(err) = outcome.error() {
            self.listeners.emit(&StakingEvent::RefreshFailed {
                view: "token",
                error: err.clone(),
            });
        }
        Ok(receipt)
    }

    /// Stake `amount`. Fails with [`CoordinatorError::InsufficientAllowance`]
    /// before touching the chain when the approved allowance is too small.
    ///
    /// Returns the optimistic position installed right after confirmation;
    /// the Position view is then refreshed from the contract.
    pub async fn stake(&self, amount: &str) -> Result<Position, CoordinatorError> {
        let (owner, amount) = self
            .prepare_stake(amount)
            .await
            .map_err(|err| self.reject(ActionKind::Stake, err))?;
        let mut action = self.actions.begin(ActionKind::Stake, &self.listeners)?;

        let receipt = self.execute(&mut action, &WriteCall::Stake { amount }).await?;

        let min_lock = self.contract.value_or_default().await.min_lock_duration;
        let optimistic = Position::optimistic(owner, amount, min_lock, self.clock.now());
        self.position.set_optimistic(Some(optimistic.clone())).await;
        self.listeners.emit(&StakingEvent::Staked {
            tx_hash: receipt.tx_hash,
            amount,
        });

        self.refresh_all().await;
        Ok(optimistic)
    }

    async fn prepare_stake(&self, amount: &str) -> Result<(Address, Amount), CoordinatorError> {
        let owner = self.require_account()?;
        let amount = positive_amount(amount)?;
        self.follow_account().await;
        let allowance = self.token.value_or_default().await.allowance;
        if amount > allowance {
            return Err(CoordinatorError::InsufficientAllowance {
                required: amount,
                allowance,
            });
        }
        Ok((owner, amount))
    }

    /// Withdraw `amount`, or the whole position when `None`.
    pub async fn withdraw(&self, amount: Option<&str>) -> Result<TxReceipt, CoordinatorError> {
        let amount = self
            .require_account()
            .and_then(|_| amount.map(positive_amount).transpose())
            .map_err(|err| self.reject(ActionKind::Withdraw, err))?;
        let mut action = self.actions.begin(ActionKind::Withdraw, &self.listeners)?;

        let receipt = self
            .execute(&mut action, &WriteCall::Withdraw { amount })
            .await?;
        self.listeners.emit(&StakingEvent::Withdrawn {
            tx_hash: receipt.tx_hash,
            amount,
        });
        self.refresh_all().await;
        Ok(receipt)
    }

    /// Withdraw the whole position before maturity, paying the contract's penalty.
    pub async fn emergency_withdraw(&self) -> Result<TxReceipt, CoordinatorError> {
        self.require_account()
            .map_err(|err| self.reject(ActionKind::EmergencyWithdraw, err))?;
        let mut action = self
            .actions
            .begin(ActionKind::EmergencyWithdraw, &self.listeners)?;

        let receipt = self
            .execute(&mut action, &WriteCall::EmergencyWithdraw)
            .await?;
        self.listeners.emit(&StakingEvent::EmergencyWithdrawn {
            tx_hash: receipt.tx_hash,
        });
        self.refresh_all().await;
        Ok(receipt)
    }

    /// Claim pending rewards. Returns the reward shown before submission.
    pub async fn claim_rewards(&self) -> Result<Amount, CoordinatorError> {
        self.require_account()
            .map_err(|err| self.reject(ActionKind::ClaimRewards, err))?;
        self.follow_account().await;
        let mut action = self.actions.begin(ActionKind::ClaimRewards, &self.listeners)?;

        let claimed = self
            .position
            .value_or_default()
            .await
            .map(|p| p.reward)
            .unwrap_or_default();
        let receipt = self.execute(&mut action, &WriteCall::ClaimRewards).await?;
        self.listeners.emit(&StakingEvent::RewardsClaimed {
            tx_hash: receipt.tx_hash,
            amount: claimed,
        });
        self.refresh_all().await;
        Ok(claimed)
    }

    /// Dashboard metrics from the current view values.
    pub async fn summary(&self) -> DashboardSummary {
        let (token, info, position) = tokio::join!(
            self.token.value_or_default(),
            self.contract.value_or_default(),
            self.position.value_or_default(),
        );
        DashboardSummary::build(
            self.writer.account(),
            &token,
            &info,
            position.as_ref(),
            self.clock.now(),
        )
    }

    fn require_account(&self) -> Result<Address, CoordinatorError> {
        self.writer
            .account()
            .ok_or(CoordinatorError::Chain(ChainError::NoWallet))
    }

    /// Report a failed precondition to listeners without claiming the
    /// action's slot or changing its phase.
    fn reject(&self, action: ActionKind, err: CoordinatorError) -> CoordinatorError {
        tracing::warn!(action = %action, error = %err, "action rejected");
        self.listeners.emit(&StakingEvent::Error {
            action,
            error: err.clone(),
        });
        err
    }

    /// Submit and confirm `call`, advancing the action's phase.
    async fn execute(
        &self,
        action: &mut ActionGuard<'_>,
        call: &WriteCall,
    ) -> Result<TxReceipt, CoordinatorError> {
        let tx_hash = match self.writer.submit(call).await {
            Ok(hash) => hash,
            Err(err) => return Err(action.fail(err)),
        };

        action.advance(ActionPhase::Confirming);
        match self.writer.confirm(&tx_hash).await {
            Ok(receipt) => {
                tracing::info!(action = %action.kind(), %tx_hash, block = receipt.block_number, "action confirmed");
                action.advance(ActionPhase::Succeeded);
                Ok(receipt)
            }
            Err(err) => Err(action.fail(err)),
        }
    }
}

fn positive_amount(input: &str) -> Result<Amount, CoordinatorError> {
    let amount = Amount::parse(input)?;
    if amount.is_zero() {
        return Err(CoordinatorError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(amount)
}

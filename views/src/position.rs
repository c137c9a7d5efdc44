//! The connected account's staking position.

use std::sync::Arc;

use stakeview_chain::{ChainError, ChainReader};
use stakeview_types::{Address, Clock, Position};

use crate::view::{View, ViewSource};

/// Builds a [`Position`] from `getUserDetails` and the contract's minimum
/// lock duration. `None` means nothing is staked and no reward is pending.
pub struct PositionSource<R> {
    reader: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> PositionSource<R> {
    pub fn new(reader: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { reader, clock }
    }
}

impl<R: ChainReader> ViewSource for PositionSource<R> {
    type Value = Option<Position>;
    const NAME: &'static str = "position";

    async fn fetch(&self, account: Option<&Address>) -> Result<Option<Position>, ChainError> {
        let Some(owner) = account else {
            return Ok(None);
        };
        let (details, info) = tokio::try_join!(
            self.reader.user_details(owner),
            self.reader.contract_info(),
        )?;
        Ok(Position::from_details(
            *owner,
            &details,
            info.min_lock_duration,
            self.clock.now(),
        ))
    }
}

pub type PositionView<R> = View<PositionSource<R>>;

#[cfg(test)]
mod tests {
    use super::*;
    use stakeview_nullables::{NullChain, NullClock};
    use stakeview_types::{Amount, ContractInfo, PositionStatus, Timestamp};

    const USER: Address = Address::new([4; 20]);

    fn setup() -> (Arc<NullClock>, Arc<NullChain>, PositionView<NullChain>) {
        let clock = Arc::new(NullClock::new(10_000));
        let chain = Arc::new(NullChain::new(clock.clone()));
        chain.set_contract_info(ContractInfo {
            min_lock_duration: 1_000,
            ..ContractInfo::default()
        });
        let view = PositionView::new(PositionSource::new(chain.clone(), clock.clone()), clock.clone());
        (clock, chain, view)
    }

    #[tokio::test]
    async fn no_stake_means_no_position() {
        let (_, _, view) = setup();
        assert!(view.set_account(Some(USER)).await.is_updated());
        assert_eq!(view.value().await, Some(None));
    }

    #[tokio::test]
    async fn locked_stake_is_pending_until_unlock() {
        let (clock, chain, view) = setup();
        chain.set_stake(USER, Amount::from_tokens(100), Timestamp::new(9_500));
        view.set_account(Some(USER)).await;

        let position = view.value_or_default().await.unwrap();
        assert_eq!(position.status, PositionStatus::Pending);
        assert_eq!(position.amount, Amount::from_tokens(100));
        assert_eq!(position.end_time, Timestamp::new(10_500));
        assert!(!position.can_withdraw);

        clock.advance(600);
        view.refresh().await;
        let position = view.value_or_default().await.unwrap();
        assert_eq!(position.status, PositionStatus::Active);
        assert!(position.can_withdraw);
        assert_eq!(position.end_time, Timestamp::new(10_500));
    }

    #[tokio::test]
    async fn unclaimed_rewards_alone_are_not_a_position() {
        let (_, chain, view) = setup();
        chain.set_pending_rewards(USER, Amount::from_tokens(5));
        view.set_account(Some(USER)).await;
        assert_eq!(view.value().await, Some(None));
    }
}

//! Global contract parameters.

use std::sync::Arc;

use stakeview_chain::{ChainError, ChainReader};
use stakeview_types::{Address, ContractInfo};

use crate::view::{View, ViewSource};

pub struct ContractSource<R> {
    reader: Arc<R>,
}

impl<R> ContractSource<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader }
    }
}

impl<R: ChainReader> ViewSource for ContractSource<R> {
    type Value = ContractInfo;
    const NAME: &'static str = "contract";

    async fn fetch(&self, _account: Option<&Address>) -> Result<ContractInfo, ChainError> {
        self.reader.contract_info().await
    }
}

pub type ContractView<R> = View<ContractSource<R>>;

#[cfg(test)]
mod tests {
    use super::*;
    use stakeview_nullables::{NullChain, NullClock};
    use stakeview_types::Amount;

    #[tokio::test]
    async fn loads_contract_parameters() {
        let clock = Arc::new(NullClock::new(0));
        let chain = Arc::new(NullChain::new(clock.clone()));
        chain.set_contract_info(ContractInfo {
            total_staked: Amount::from_tokens(2_500),
            min_lock_duration: 86_400,
            ..ContractInfo::default()
        });

        let view = ContractView::new(ContractSource::new(chain.clone()), clock);
        assert_eq!(view.refresh().await, crate::RefreshOutcome::Skipped);
        assert!(chain.read_calls().is_empty());

        assert!(view.set_account(Some(Address::new([1; 20]))).await.is_updated());
        let info = view.value_or_default().await;
        assert_eq!(info.total_staked, Amount::from_tokens(2_500));
        assert_eq!(info.min_lock_duration, 86_400);
        assert_eq!(chain.read_calls(), vec!["contract_info"]);
    }
}

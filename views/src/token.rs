//! Token balance and allowance view.

use std::sync::Arc;

use stakeview_chain::{ChainError, ChainReader};
use stakeview_types::{Address, TokenInfo};

use crate::view::{View, ViewSource};

/// Balance of the connected account and its allowance toward `spender`
/// (the staking contract).
pub struct TokenSource<R> {
    reader: Arc<R>,
    spender: Address,
}

impl<R> TokenSource<R> {
    pub fn new(reader: Arc<R>, spender: Address) -> Self {
        Self { reader, spender }
    }
}

impl<R: ChainReader> ViewSource for TokenSource<R> {
    type Value = TokenInfo;
    const NAME: &'static str = "token";

    async fn fetch(&self, account: Option<&Address>) -> Result<TokenInfo, ChainError> {
        let Some(owner) = account else {
            return Ok(TokenInfo::default());
        };
        let (balance, allowance) = tokio::try_join!(
            self.reader.token_balance(owner),
            self.reader.token_allowance(owner, &self.spender),
        )?;
        Ok(TokenInfo { balance, allowance })
    }
}

pub type TokenView<R> = View<TokenSource<R>>;

#[cfg(test)]
mod tests {
    use super::*;
    use stakeview_nullables::{NullChain, NullClock, STAKING_CONTRACT};
    use stakeview_types::Amount;

    const USER: Address = Address::new([3; 20]);

    #[tokio::test]
    async fn loads_balance_and_allowance_together() {
        let clock = Arc::new(NullClock::new(0));
        let chain = Arc::new(NullChain::new(clock.clone()));
        chain.set_balance(USER, Amount::from_tokens(1_000));
        chain.set_allowance(USER, Amount::from_tokens(50));

        let view = TokenView::new(TokenSource::new(chain.clone(), STAKING_CONTRACT), clock);
        assert!(view.set_account(Some(USER)).await.is_updated());
        let info = view.value_or_default().await;
        assert_eq!(info.balance, Amount::from_tokens(1_000));
        assert_eq!(info.allowance, Amount::from_tokens(50));
        assert!(info.needs_approval(Amount::from_tokens(100)));
    }

    #[tokio::test]
    async fn one_failed_call_fails_the_refresh() {
        let clock = Arc::new(NullClock::new(0));
        let chain = Arc::new(NullChain::new(clock.clone()));
        chain.fail_reads(ChainError::Network("timeout".into()), 1);

        let view = TokenView::new(TokenSource::new(chain, STAKING_CONTRACT), clock);
        let outcome = view.set_account(Some(USER)).await;
        assert!(outcome.error().is_some());
        assert_eq!(view.value().await, None);
    }
}

//! Generic refreshable view.

use std::sync::Arc;

use stakeview_chain::ChainError;
use stakeview_types::{Address, Clock, Timestamp};
use tokio::sync::RwLock;

/// How a view fetches its value.
#[allow(async_fn_in_trait)]
pub trait ViewSource {
    type Value: Clone + Default;

    /// Name used in logs.
    const NAME: &'static str;

    /// Without an account, refreshing a view that requires one is a no-op.
    const REQUIRES_ACCOUNT: bool = true;

    /// Fetch a fresh value. `account` is always `Some` when
    /// [`REQUIRES_ACCOUNT`](Self::REQUIRES_ACCOUNT) is set.
    async fn fetch(&self, account: Option<&Address>) -> Result<Self::Value, ChainError>;
}

/// Result of one refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The value was replaced.
    Updated,
    /// The fetch failed; the error is in the view's slot and the previous value kept.
    Failed(ChainError),
    /// Nothing was fetched (no account), or the result was discarded because
    /// the account changed while it was in flight.
    Skipped,
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated)
    }

    pub fn error(&self) -> Option<&ChainError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Point-in-time copy of a view's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSnapshot<T> {
    pub account: Option<Address>,
    /// `None` before the first successful load.
    pub value: Option<T>,
    pub loading: bool,
    pub error: Option<ChainError>,
    pub updated_at: Option<Timestamp>,
}

impl<T: Clone + Default> ViewSnapshot<T> {
    pub fn value_or_default(&self) -> T {
        self.value.clone().unwrap_or_default()
    }
}

struct ViewState<T> {
    account: Option<Address>,
    value: Option<T>,
    in_flight: usize,
    error: Option<ChainError>,
    updated_at: Option<Timestamp>,
    /// Bumped on every account change; results from an older generation are dropped.
    generation: u64,
}

/// A cached, refreshable value keyed by the connected account.
pub struct View<S: ViewSource> {
    source: S,
    clock: Arc<dyn Clock>,
    state: RwLock<ViewState<S::Value>>,
}

impl<S: ViewSource> View<S> {
    pub fn new(source: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            state: RwLock::new(ViewState {
                account: None,
                value: None,
                in_flight: 0,
                error: None,
                updated_at: None,
                generation: 0,
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn account(&self) -> Option<Address> {
        self.state.read().await.account
    }

    /// Switch the account key. A change clears the cached state and runs an
    /// initial load; setting the same account again does nothing.
    pub async fn set_account(&self, account: Option<Address>) -> RefreshOutcome {
        {
            let mut state = self.state.write().await;
            if state.account == account && state.generation > 0 {
                return RefreshOutcome::Skipped;
            }
            state.account = account;
            state.generation += 1;
            state.value = None;
            state.error = None;
            state.in_flight = 0;
            state.updated_at = None;
        }
        self.refresh().await
    }

    /// Re-fetch the value. On success the value is replaced and the error
    /// cleared; on failure the error is recorded and the old value kept.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (account, generation) = {
            let mut state = self.state.write().await;
            if S::REQUIRES_ACCOUNT && state.account.is_none() {
                state.value = None;
                state.error = None;
                return RefreshOutcome::Skipped;
            }
            state.in_flight += 1;
            (state.account, state.generation)
        };

        tracing::debug!(view = S::NAME, account = ?account, "refreshing view");
        let result = self.source.fetch(account.as_ref()).await;

        let mut state = self.state.write().await;
        if state.generation != generation {
            tracing::debug!(view = S::NAME, "discarding result for previous account");
            return RefreshOutcome::Skipped;
        }
        state.in_flight = state.in_flight.saturating_sub(1);

        match result {
            Ok(value) => {
                state.value = Some(value);
                state.error = None;
                state.updated_at = Some(self.clock.now());
                RefreshOutcome::Updated
            }
            Err(err) => {
                tracing::warn!(view = S::NAME, error = %err, "view refresh failed");
                state.error = Some(err.clone());
                RefreshOutcome::Failed(err)
            }
        }
    }

    /// Replace the displayed value without reading the chain. The next
    /// successful refresh overwrites it.
    pub async fn set_optimistic(&self, value: S::Value) {
        self.state.write().await.value = Some(value);
    }

    pub async fn snapshot(&self) -> ViewSnapshot<S::Value> {
        let state = self.state.read().await;
        ViewSnapshot {
            account: state.account,
            value: state.value.clone(),
            loading: state.in_flight > 0,
            error: state.error.clone(),
            updated_at: state.updated_at,
        }
    }

    pub async fn value(&self) -> Option<S::Value> {
        self.state.read().await.value.clone()
    }

    pub async fn value_or_default(&self) -> S::Value {
        self.value().await.unwrap_or_default()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.in_flight > 0
    }

    pub async fn error(&self) -> Option<ChainError> {
        self.state.read().await.error.clone()
    }
}

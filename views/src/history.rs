//! Staking event history.

use stakeview_chain::{ChainError, EventReader, EventSource};
use stakeview_types::{Address, TransactionEvent};

use crate::view::{View, ViewSource};

/// Full refetch of the merged event history on every refresh.
pub struct HistorySource<S> {
    events: EventReader<S>,
}

impl<S> HistorySource<S> {
    pub fn new(events: EventReader<S>) -> Self {
        Self { events }
    }
}

impl<S: EventSource> ViewSource for HistorySource<S> {
    type Value = Vec<TransactionEvent>;
    const NAME: &'static str = "history";
    const REQUIRES_ACCOUNT: bool = false;

    async fn fetch(&self, _account: Option<&Address>) -> Result<Vec<TransactionEvent>, ChainError> {
        self.events.fetch_history().await
    }
}

pub type HistoryView<S> = View<HistorySource<S>>;

/// Events performed by `user`, order preserved.
pub fn filter_by_user<'a>(
    events: &'a [TransactionEvent],
    user: &'a Address,
) -> impl Iterator<Item = &'a TransactionEvent> + 'a {
    events.iter().filter(move |e| e.user == *user)
}

//! Refreshable cached views.
//!
//! Each view pairs a [`ViewSource`] (how to fetch one record from the chain)
//! with cached state: the last value, a loading flag, an error slot and the
//! time of the last successful update. Views never propagate read errors;
//! a refresh reports a [`RefreshOutcome`] and keeps the previous value on
//! failure.

pub mod contract;
pub mod history;
pub mod position;
pub mod token;
pub mod view;

pub use contract::{ContractSource, ContractView};
pub use history::{filter_by_user, HistorySource, HistoryView};
pub use position::{PositionSource, PositionView};
pub use token::{TokenSource, TokenView};
pub use view::{RefreshOutcome, View, ViewSnapshot, ViewSource};

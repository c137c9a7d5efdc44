//! Coordinator errors.

use stakeview_chain::ChainError;
use stakeview_types::{Amount, AmountError};
use thiserror::Error;

use crate::ActionKind;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("insufficient allowance: staking {required} requires approval (approved: {allowance})")]
    InsufficientAllowance { required: Amount, allowance: Amount },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} is already in progress")]
    ActionInProgress(ActionKind),
}

impl From<AmountError> for CoordinatorError {
    fn from(err: AmountError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl CoordinatorError {
    /// The wrapped chain error, if this came from the chain.
    pub fn chain(&self) -> Option<&ChainError> {
        match self {
            Self::Chain(err) => Some(err),
            _ => None,
        }
    }
}

//! Parse errors for the primitive types.

use thiserror::Error;

/// Failure to parse a human decimal string into an [`Amount`](crate::Amount).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid amount: {0:?}")]
    Invalid(String),

    #[error("amount has more than {max} decimal places")]
    TooManyDecimals { max: usize },

    #[error("amount is too large")]
    Overflow,
}

/// Failure to parse a `0x`-prefixed hex string into a fixed-size value.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseHexError {
    #[error("missing 0x prefix")]
    MissingPrefix,

    #[error("expected {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("invalid hex: {0}")]
    Invalid(String),
}

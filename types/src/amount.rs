//! Fixed-point amounts with 18 implied decimal places.
//!
//! Every magnitude the staking contract exposes (token balances, stakes,
//! rewards, APR parameters) is a `uint256` scaled by 10^18. Amounts are kept
//! as raw integer units and only converted to and from human decimal strings
//! at the edges. No floating point is involved at any step.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AmountError;

/// Number of implied decimal places in every on-chain amount.
pub const DECIMALS: usize = 18;

/// 10^18, the raw value of one whole unit.
const UNIT: u128 = 1_000_000_000_000_000_000;

/// An unsigned 18-decimal fixed-point magnitude.
///
/// Serialized as its human decimal string (`"1.5"`), so config files and JSON
/// output never expose raw units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);

    /// Wrap raw units (already scaled by 10^18).
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Whole tokens, scaled up by 10^18. Saturates on overflow.
    pub const fn from_tokens(tokens: u128) -> Self {
        Self(tokens.saturating_mul(UNIT))
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Parse a human decimal string such as `"100"`, `"0.25"` or `".5"`.
    ///
    /// Signs, exponents, separators and more than 18 fractional digits are
    /// rejected rather than rounded.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }

        let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if frac_part.len() > DECIMALS {
            return Err(AmountError::TooManyDecimals { max: DECIMALS });
        }

        let padding = std::iter::repeat(b'0').take(DECIMALS - frac_part.len());
        let mut raw: u128 = 0;
        for digit in int_part.bytes().chain(frac_part.bytes()).chain(padding) {
            raw = raw
                .checked_mul(10)
                .and_then(|r| r.checked_add(u128::from(digit - b'0')))
                .ok_or(AmountError::Overflow)?;
        }
        Ok(Self(raw))
    }

    /// Exact decimal representation with trailing zeros trimmed (`"1.5"`, `"100"`).
    pub fn format(&self) -> String {
        let whole = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            return whole.to_string();
        }
        let digits = format!("{frac:0width$}", width = DECIMALS);
        format!("{whole}.{}", digits.trim_end_matches('0'))
    }

    /// Decimal representation rounded half-up to `places` fractional digits.
    pub fn to_fixed(&self, places: usize) -> String {
        if places >= DECIMALS {
            let digits = format!("{:0width$}", self.0 % UNIT, width = DECIMALS);
            let zeros = "0".repeat(places - DECIMALS);
            return format!("{}.{digits}{zeros}", self.0 / UNIT);
        }

        let scale = 10u128.pow((DECIMALS - places) as u32);
        let mut units = self.0 / scale;
        if self.0 % scale >= scale / 2 {
            units += 1;
        }
        if places == 0 {
            return units.to_string();
        }
        let divisor = 10u128.pow(places as u32);
        format!(
            "{}.{:0width$}",
            units / divisor,
            units % divisor,
            width = places
        )
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.format()
    }
}

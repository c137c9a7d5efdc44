//! 20-byte account and contract addresses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseHexError;

/// An EVM account or contract address.
///
/// Parsed from and displayed as lowercase `0x`-prefixed hex. Mixed-case
/// (checksummed) input is accepted; the checksum itself is not verified.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-pad to a 32-byte ABI word.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// `0x1234...abcd` form for compact display.
    pub fn short(&self) -> String {
        shorten(&self.to_string())
    }
}

/// Decode `0x`-prefixed hex of exactly `N` bytes.
pub(crate) fn decode_prefixed<const N: usize>(s: &str) -> Result<[u8; N], ParseHexError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or(ParseHexError::MissingPrefix)?;
    if digits.len() != N * 2 {
        return Err(ParseHexError::Length {
            expected: N * 2,
            actual: digits.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out).map_err(|e| ParseHexError::Invalid(e.to_string()))?;
    Ok(out)
}

/// Keep the first six and last four characters of a hex string.
pub(crate) fn shorten(full: &str) -> String {
    if full.len() <= 10 {
        return full.to_string();
    }
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

impl FromStr for Address {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_prefixed::<20>(s.trim()).map(Self)
    }
}

impl TryFrom<String> for Address {
    type Error = ParseHexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

//! Minimal Solidity ABI support.
//!
//! The staking surface only uses static types (`address`, `uint256`, `bool`),
//! so every argument and return value is exactly one 32-byte word. Values are
//! held as `u128`; a returned `uint256` with any of its high 16 bytes set is a
//! shape error.

use sha3::{Digest, Keccak256};
use stakeview_types::{Address, Amount, Timestamp};

use crate::error::ChainError;

/// One 32-byte ABI word.
pub type Word = [u8; 32];

/// `Error(string)` selector used by `require`/`revert` with a message.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// `Panic(uint256)` selector used by failed assertions and arithmetic faults.
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

pub fn keccak256(data: &[u8]) -> Word {
    Keccak256::digest(data).into()
}

/// First four bytes of the Keccak-256 hash of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Topic 0 of a log for the given canonical event signature.
pub fn event_topic(signature: &str) -> Word {
    keccak256(signature.as_bytes())
}

/// A call argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u128),
}

impl Token {
    fn to_word(self) -> Word {
        match self {
            Token::Address(address) => address.to_word(),
            Token::Uint(value) => uint_word(value),
        }
    }
}

impl From<Address> for Token {
    fn from(address: Address) -> Self {
        Token::Address(address)
    }
}

impl From<Amount> for Token {
    fn from(amount: Amount) -> Self {
        Token::Uint(amount.raw())
    }
}

pub fn uint_word(value: u128) -> Word {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&arg.to_word());
    }
    data
}

/// Split return data into words.
pub fn words(data: &[u8]) -> Result<Vec<Word>, ChainError> {
    if data.len() % 32 != 0 {
        return Err(ChainError::ContractCall(format!(
            "return data length {} is not a multiple of 32",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

/// Typed access to a decoded word list, reporting shape errors against `context`.
pub struct Decoder<'a> {
    words: &'a [Word],
    context: &'a str,
}

impl<'a> Decoder<'a> {
    /// Require at least `expected` words.
    pub fn new(words: &'a [Word], expected: usize, context: &'a str) -> Result<Self, ChainError> {
        if words.len() < expected {
            return Err(ChainError::ContractCall(format!(
                "{context}: expected {expected} words, got {}",
                words.len()
            )));
        }
        Ok(Self { words, context })
    }

    pub fn uint(&self, index: usize) -> Result<u128, ChainError> {
        let word = &self.words[index];
        if word[..16].iter().any(|b| *b != 0) {
            return Err(self.shape(index, "uint256 does not fit in 128 bits"));
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&word[16..]);
        Ok(u128::from_be_bytes(low))
    }

    pub fn amount(&self, index: usize) -> Result<Amount, ChainError> {
        self.uint(index).map(Amount::from_raw)
    }

    pub fn u64(&self, index: usize) -> Result<u64, ChainError> {
        u64::try_from(self.uint(index)?).map_err(|_| self.shape(index, "value does not fit in 64 bits"))
    }

    pub fn timestamp(&self, index: usize) -> Result<Timestamp, ChainError> {
        self.u64(index).map(Timestamp::new)
    }

    pub fn bool(&self, index: usize) -> Result<bool, ChainError> {
        match self.uint(index)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(self.shape(index, "bool word is neither 0 nor 1")),
        }
    }

    pub fn address(&self, index: usize) -> Result<Address, ChainError> {
        address_from_word(&self.words[index]).ok_or_else(|| self.shape(index, "address has dirty high bytes"))
    }

    fn shape(&self, index: usize, what: &str) -> ChainError {
        ChainError::ContractCall(format!("{}: word {index}: {what}", self.context))
    }
}

pub fn address_from_word(word: &Word) -> Option<Address> {
    if word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..]);
    Some(Address::new(bytes))
}

/// Decode the human-readable reason from revert data, if it carries one.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    let (head, body) = data.split_at(4);
    let words = words(body).ok()?;

    if head == ERROR_STRING_SELECTOR {
        let decoder = Decoder::new(&words, 2, "Error(string)").ok()?;
        let offset = usize::try_from(decoder.uint(0).ok()?).ok()?;
        let len_index = offset / 32;
        let len = usize::try_from(Decoder::new(&words, len_index + 1, "Error(string)").ok()?.uint(len_index).ok()?).ok()?;
        let start = offset + 32;
        let bytes = body.get(start..start + len)?;
        return String::from_utf8(bytes.to_vec()).ok();
    }

    if head == PANIC_SELECTOR {
        let code = Decoder::new(&words, 1, "Panic(uint256)").ok()?.uint(0).ok()?;
        return Some(format!("panic code {code:#x}"));
    }

    None
}

/// Parse `0x`-prefixed hex bytes as returned by the node.
pub fn decode_hex_bytes(s: &str) -> Result<Vec<u8>, ChainError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| ChainError::ContractCall(format!("invalid hex data: {e}")))
}

pub fn encode_hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_selectors() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("approve(address,uint256)")), "095ea7b3");
        assert_eq!(hex::encode(selector("allowance(address,address)")), "dd62ed3e");
    }

    #[test]
    fn well_known_event_topic() {
        assert_eq!(
            hex::encode(event_topic("Transfer(address,address,uint256)")),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn encode_call_lays_out_words() {
        let spender = Address::new([0xaa; 20]);
        let data = encode_call(
            "approve(address,uint256)",
            &[spender.into(), Amount::from_tokens(1).into()],
        );
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &selector("approve(address,uint256)"));
        assert_eq!(&data[4 + 12..4 + 32], spender.as_bytes());
        assert_eq!(&data[36..68], &uint_word(1_000_000_000_000_000_000));
    }

    #[test]
    fn decoder_checks_shape() {
        let ws = vec![uint_word(7), uint_word(1), Address::new([3; 20]).to_word()];
        let decoder = Decoder::new(&ws, 3, "test").unwrap();
        assert_eq!(decoder.uint(0).unwrap(), 7);
        assert!(decoder.bool(1).unwrap());
        assert!(decoder.bool(0).is_err());
        assert_eq!(decoder.address(2).unwrap(), Address::new([3; 20]));

        assert!(matches!(
            Decoder::new(&ws, 4, "test"),
            Err(ChainError::ContractCall(_))
        ));
    }

    #[test]
    fn decoder_rejects_wide_uints() {
        let mut wide = [0u8; 32];
        wide[0] = 1;
        let ws = vec![wide];
        let decoder = Decoder::new(&ws, 1, "wide").unwrap();
        assert!(decoder.uint(0).is_err());
    }

    #[test]
    fn words_rejects_ragged_data() {
        assert!(words(&[0u8; 31]).is_err());
        assert_eq!(words(&[0u8; 64]).unwrap().len(), 2);
        assert!(words(&[]).unwrap().is_empty());
    }

    #[test]
    fn revert_reason_from_error_string() {
        let message = b"Lock period not ended";
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend_from_slice(&uint_word(32));
        data.extend_from_slice(&uint_word(message.len() as u128));
        let mut padded = message.to_vec();
        padded.resize(32, 0);
        data.extend_from_slice(&padded);

        assert_eq!(
            decode_revert_reason(&data).as_deref(),
            Some("Lock period not ended")
        );
    }

    #[test]
    fn revert_reason_from_panic() {
        let mut data = PANIC_SELECTOR.to_vec();
        data.extend_from_slice(&uint_word(0x11));
        assert_eq!(decode_revert_reason(&data).as_deref(), Some("panic code 0x11"));
    }

    #[test]
    fn revert_reason_absent_for_custom_errors() {
        assert_eq!(decode_revert_reason(&[0xde, 0xad, 0xbe, 0xef]), None);
        assert_eq!(decode_revert_reason(&[]), None);
    }

    #[test]
    fn hex_bytes_round_trip() {
        let bytes = vec![0x01, 0xff, 0x10];
        assert_eq!(encode_hex_bytes(&bytes), "0x01ff10");
        assert_eq!(decode_hex_bytes("0x01ff10").unwrap(), bytes);
        assert!(decode_hex_bytes("0xzz").is_err());
    }
}

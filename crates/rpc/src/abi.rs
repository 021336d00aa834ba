//! Minimal Solidity ABI support for the chef contracts.
//!
//! Only the shapes the migrator needs: static words (`address`, `uint256`,
//! `bool`) and dynamic one-dimensional arrays of them.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use sha3::{Digest, Keccak256};

pub const WORD_SIZE: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("word {index} is out of bounds for {len} bytes of return data")]
    OutOfBounds { index: usize, len: usize },
    #[error("value {value} does not fit in {target}")]
    Overflow { value: U256, target: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
    Bool(bool),
    UintArray(Vec<U256>),
    AddressArray(Vec<Address>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Self::UintArray(_) | Self::AddressArray(_))
    }
}

pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(&Keccak256::digest(data.as_ref()))
}

/// First four bytes of the keccak hash of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    keccak(signature.as_bytes())
        .as_bytes()
        .first_chunk::<4>()
        .copied()
        .unwrap_or_default()
}

/// `topic0` of an event with the given canonical signature.
pub fn event_topic(signature: &str) -> H256 {
    keccak(signature.as_bytes())
}

pub fn encode_call(signature: &str, tokens: &[Token]) -> Bytes {
    let head_size = tokens.len() * WORD_SIZE;
    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word(U256::from(head_size + tail.len())));
        }
        match token {
            Token::Address(address) => head.extend_from_slice(&address_word(*address)),
            Token::Uint(value) => head.extend_from_slice(&uint_word(*value)),
            Token::Bool(flag) => head.extend_from_slice(&uint_word(U256::from(u8::from(*flag)))),
            Token::UintArray(values) => {
                tail.extend_from_slice(&uint_word(U256::from(values.len())));
                for value in values {
                    tail.extend_from_slice(&uint_word(*value));
                }
            }
            Token::AddressArray(addresses) => {
                tail.extend_from_slice(&uint_word(U256::from(addresses.len())));
                for address in addresses {
                    tail.extend_from_slice(&address_word(*address));
                }
            }
        }
    }

    let mut calldata = Vec::with_capacity(4 + head.len() + tail.len());
    calldata.extend_from_slice(&selector(signature));
    calldata.extend_from_slice(&head);
    calldata.extend_from_slice(&tail);
    Bytes::from(calldata)
}

fn uint_word(value: U256) -> [u8; WORD_SIZE] {
    value.to_big_endian()
}

fn address_word(address: Address) -> [u8; WORD_SIZE] {
    let mut word = [0u8; WORD_SIZE];
    for (byte, value) in word.iter_mut().skip(12).zip(address.as_bytes()) {
        *byte = *value;
    }
    word
}

/// Word-indexed view over return data or log data.
#[derive(Debug, Clone, Copy)]
pub struct AbiReader<'a> {
    data: &'a [u8],
}

impl<'a> AbiReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn word(&self, index: usize) -> Result<U256, AbiError> {
        let start = index * WORD_SIZE;
        self.data
            .get(start..start + WORD_SIZE)
            .map(U256::from_big_endian)
            .ok_or(AbiError::OutOfBounds {
                index,
                len: self.data.len(),
            })
    }

    pub fn address(&self, index: usize) -> Result<Address, AbiError> {
        let word = self.word(index)?.to_big_endian();
        Ok(Address::from_slice(word.get(12..).unwrap_or_default()))
    }

    pub fn bool(&self, index: usize) -> Result<bool, AbiError> {
        Ok(!self.word(index)?.is_zero())
    }

    pub fn u64(&self, index: usize) -> Result<u64, AbiError> {
        word_to_u64(self.word(index)?)
    }

    /// Dynamic `uint256[]` whose offset sits at word `index`.
    pub fn uint_array(&self, index: usize) -> Result<Vec<U256>, AbiError> {
        let offset = word_to_usize(self.word(index)?)?;
        let data = self.data.get(offset..).ok_or(AbiError::OutOfBounds {
            index,
            len: self.data.len(),
        })?;
        let array = AbiReader::new(data);
        let len = word_to_usize(array.word(0)?)?;
        (1..=len).map(|element| array.word(element)).collect()
    }
}

pub fn word_to_u64(value: U256) -> Result<u64, AbiError> {
    if value > U256::from(u64::MAX) {
        return Err(AbiError::Overflow {
            value,
            target: "u64",
        });
    }
    Ok(value.low_u64())
}

fn word_to_usize(value: U256) -> Result<usize, AbiError> {
    usize::try_from(word_to_u64(value)?).map_err(|_| AbiError::Overflow {
        value,
        target: "usize",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_match_well_known_functions() {
        assert_eq!(selector("approve(address,uint256)"), [0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(selector("getReserves()"), [0x09, 0x02, 0xf1, 0xac]);
    }

    #[test]
    fn event_topic_matches_transfer() {
        assert_eq!(
            format!("{:#x}", event_topic("Transfer(address,address,uint256)")),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn encodes_static_arguments_in_place() {
        let spender = Address::from_low_u64_be(0xbeef);
        let calldata = encode_call(
            "approve(address,uint256)",
            &[Token::Address(spender), Token::Uint(U256::from(5u64))],
        );

        assert_eq!(
            hex::encode(&calldata),
            concat!(
                "095ea7b3",
                "000000000000000000000000000000000000000000000000000000000000beef",
                "0000000000000000000000000000000000000000000000000000000000000005",
            )
        );
    }

    #[test]
    fn encodes_dynamic_arrays_after_the_head() {
        let calldata = encode_call(
            "withdraw(uint256,uint256,uint256[],bool,bool)",
            &[
                Token::Uint(U256::from(1u64)),
                Token::Uint(U256::from(2u64)),
                Token::UintArray(vec![U256::from(7u64), U256::from(8u64)]),
                Token::Bool(false),
                Token::Bool(true),
            ],
        );
        let reader = AbiReader::new(calldata.get(4..).unwrap_or_default());

        assert_eq!(calldata.len(), 4 + 8 * WORD_SIZE);
        // Offset of the array tail: five head words.
        assert_eq!(reader.word(2), Ok(U256::from(160u64)));
        assert_eq!(reader.bool(3), Ok(false));
        assert_eq!(reader.bool(4), Ok(true));
        assert_eq!(
            reader.uint_array(2),
            Ok(vec![U256::from(7u64), U256::from(8u64)])
        );
    }

    #[test]
    fn reader_reports_short_data() {
        let data = [0u8; 40];
        let reader = AbiReader::new(&data);

        assert_eq!(reader.word(0), Ok(U256::zero()));
        assert_eq!(reader.word(1), Err(AbiError::OutOfBounds { index: 1, len: 40 }));
    }

    #[test]
    fn reads_addresses_from_low_bytes() {
        let mut data = [0u8; 32];
        for byte in data.iter_mut().skip(12) {
            *byte = 0x11;
        }

        assert_eq!(AbiReader::new(&data).address(0), Ok(Address::repeat_byte(0x11)));
    }

    #[test]
    fn rejects_oversized_u64_words() {
        let value = U256::from(u64::MAX) + U256::one();

        assert_eq!(
            word_to_u64(value),
            Err(AbiError::Overflow {
                value,
                target: "u64"
            })
        );
    }
}

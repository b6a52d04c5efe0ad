//! 20-byte address type.
//!
//! Besides the usual byte/hex conversions, [`Address::from_bookkeepers`]
//! derives the multi-signature address committed in a block header as the
//! `next_bookkeeper` of the following height.

use crate::{Error, Result};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tally_crypto::{bft_threshold, keccak256_concat, PublicKey};

/// Size of an address in bytes
pub const ADDRESS_SIZE: usize = 20;

/// A 20-byte address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// The zero address
    pub const ZERO: Self = Self([0u8; ADDRESS_SIZE]);

    /// Creates a new address from a 20-byte array.
    #[inline]
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates an address from a slice of exactly 20 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; ADDRESS_SIZE] = slice.try_into().map_err(|_| Error::InvalidLength {
            expected: ADDRESS_SIZE,
            actual: slice.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Derive the M-of-N multi-signature address of a bookkeeper set.
    ///
    /// Keys are sorted by their compressed encoding first, so the address does
    /// not depend on the order of `bookkeepers`. The preimage is the big-endian
    /// `u16` threshold followed by every compressed key; the address is the last
    /// 20 bytes of its Keccak256 digest.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tally_crypto::PrivateKey;
    /// use tally_types::Address;
    ///
    /// let a = PrivateKey::random().public_key();
    /// let b = PrivateKey::random().public_key();
    ///
    /// assert_eq!(Address::from_bookkeepers(&[a, b]), Address::from_bookkeepers(&[b, a]));
    /// ```
    pub fn from_bookkeepers(bookkeepers: &[PublicKey]) -> Self {
        let mut sorted: Vec<[u8; 33]> = bookkeepers.iter().map(|k| k.to_compressed()).collect();
        sorted.sort_unstable();

        let threshold = (bft_threshold(bookkeepers.len()) as u16).to_be_bytes();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(sorted.len() + 1);
        parts.push(&threshold);
        parts.extend(sorted.iter().map(|k| k.as_slice()));

        let digest = keccak256_concat(&parts);
        let mut out = [0u8; ADDRESS_SIZE];
        out.copy_from_slice(&digest[32 - ADDRESS_SIZE..]);
        Self(out)
    }

    /// Returns the address as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Checks if this is the zero address.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    /// Parses 40 hex characters, optionally `0x`-prefixed.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != ADDRESS_SIZE * 2 {
            return Err(Error::InvalidAddress(format!(
                "expected 40 hex characters, got {}",
                s.len()
            )));
        }
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }

    /// Lowercase hex with 0x prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl From<[u8; ADDRESS_SIZE]> for Address {
    fn from(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Encodable for Address {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl Decodable for Address {
    fn decode(rlp: &Rlp<'_>) -> std::result::Result<Self, DecoderError> {
        rlp.decoder().decode_value(|bytes| {
            bytes
                .try_into()
                .map(Self)
                .map_err(|_| DecoderError::RlpInvalidLength)
        })
    }
}

//! Signed envelope carried between bookkeepers.
//!
//! Wire layout, all integers little-endian:
//!
//! ```text
//! version:u32 | prev_hash:32 | height:u32 | bookkeeper_index:u16 | timestamp:u32
//! | data:var-bytes | owner:var-bytes | signature:var-bytes
//! ```
//!
//! The signature covers every field before it, the owner key included.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tally_core::traits::{CryptoResult, Signer, Verifier};
use tally_crypto::PublicKey;
use tally_types::codec::{
    expect_end, read_array, read_u16, read_u32, read_var_bytes, write_var_bytes, DecodeError,
    DecodeResult,
};
use tally_types::H256;

use crate::message::ConsensusMessage;

/// Payload format version.
pub const CONSENSUS_VERSION: u32 = 0;

/// A consensus message addressed from one bookkeeper for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusPayload {
    /// Format version
    pub version: u32,
    /// Ledger head the sender is building on
    pub prev_hash: H256,
    /// Height being agreed
    pub height: u32,
    /// Sender's index in the bookkeeper set
    pub bookkeeper_index: u16,
    /// Round timestamp (unix seconds)
    pub timestamp: u32,
    /// Encoded [`ConsensusMessage`]
    pub data: Vec<u8>,
    /// Sender's public key
    pub owner: PublicKey,
    /// Sender's signature over [`ConsensusPayload::unsigned_bytes`]
    pub signature: Vec<u8>,
}

impl ConsensusPayload {
    /// Bytes covered by the signature.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(96 + self.data.len());
        self.put_unsigned(&mut buf);
        buf.to_vec()
    }

    fn put_unsigned(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.version);
        buf.put_slice(self.prev_hash.as_bytes());
        buf.put_u32_le(self.height);
        buf.put_u16_le(self.bookkeeper_index);
        buf.put_u32_le(self.timestamp);
        write_var_bytes(buf, &self.data);
        write_var_bytes(buf, &self.owner.to_compressed());
    }

    /// Hash of the unsigned bytes, used to identify a payload in logs.
    pub fn hash(&self) -> H256 {
        H256::keccak256(&self.unsigned_bytes())
    }

    /// Sign in place with the local key.
    pub fn sign(&mut self, signer: &dyn Signer) -> CryptoResult<()> {
        self.signature = signer.sign(&self.unsigned_bytes())?;
        Ok(())
    }

    /// Check the signature against `owner`.
    pub fn verify(&self, verifier: &dyn Verifier) -> bool {
        verifier.verify(&self.owner, &self.unsigned_bytes(), &self.signature)
    }

    /// Serialize including the signature.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(160 + self.data.len());
        self.put_unsigned(&mut buf);
        write_var_bytes(&mut buf, &self.signature);
        buf.freeze()
    }

    /// Parse a payload. The whole input must be consumed.
    pub fn decode(data: &[u8]) -> DecodeResult<Self> {
        let mut buf = data;
        let version = read_u32(&mut buf)?;
        let prev_hash = H256::from(read_array::<32, _>(&mut buf)?);
        let height = read_u32(&mut buf)?;
        let bookkeeper_index = read_u16(&mut buf)?;
        let timestamp = read_u32(&mut buf)?;
        let data = read_var_bytes(&mut buf)?;
        let raw_owner = read_var_bytes(&mut buf)?;
        let owner = PublicKey::from_sec1_bytes(&raw_owner)
            .map_err(|e| DecodeError::InvalidPublicKey(e.to_string()))?;
        let signature = read_var_bytes(&mut buf)?;
        expect_end(&buf)?;

        Ok(Self {
            version,
            prev_hash,
            height,
            bookkeeper_index,
            timestamp,
            data,
            owner,
            signature,
        })
    }

    /// Decode the embedded message.
    pub fn message(&self) -> DecodeResult<ConsensusMessage> {
        ConsensusMessage::decode(&self.data)
    }
}

impl fmt::Display for ConsensusPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Payload(height={}, index={}, prev={}, {} bytes)",
            self.height,
            self.bookkeeper_index,
            self.prev_hash.short(),
            self.data.len()
        )
    }
}

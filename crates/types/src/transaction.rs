//! Transactions carried in consensus proposals.
//!
//! The consensus engine treats transactions as opaque apart from two things:
//! their hash (for duplicate detection and the transactions root) and the
//! distinction between the proposer's bookkeeping transaction and regular
//! pool transactions.

use crate::{Error, Result, H256};
use bytes::Bytes;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use tally_crypto::PublicKey;

/// Transaction type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum TxType {
    /// Proposer's bookkeeping transaction, always first in a proposal
    Bookkeeping = 0x00,
    /// Ordinary transaction taken from the pool
    #[default]
    Regular = 0x01,
}

impl TxType {
    /// Returns the transaction type byte.
    pub const fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Creates a TxType from a byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::Bookkeeping),
            0x01 => Ok(Self::Regular),
            _ => Err(Error::InvalidTransaction(format!(
                "unknown transaction type: 0x{:02x}",
                byte
            ))),
        }
    }
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction type
    pub tx_type: TxType,
    /// Sender-chosen nonce; also makes bookkeeping transactions unique
    pub nonce: u64,
    /// Opaque payload
    pub payload: Bytes,
}

impl Transaction {
    /// Creates a regular transaction.
    pub fn new(nonce: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            tx_type: TxType::Regular,
            nonce,
            payload: payload.into(),
        }
    }

    /// Creates the bookkeeping transaction a primary puts at the head of its
    /// proposal. The payload is the proposer's compressed public key.
    pub fn bookkeeping(nonce: u64, proposer: &PublicKey) -> Self {
        Self {
            tx_type: TxType::Bookkeeping,
            nonce,
            payload: Bytes::copy_from_slice(&proposer.to_compressed()),
        }
    }

    /// Returns true for bookkeeping transactions.
    pub fn is_bookkeeping(&self) -> bool {
        self.tx_type == TxType::Bookkeeping
    }

    /// Keccak256 of the RLP encoding.
    pub fn hash(&self) -> H256 {
        H256::keccak256(&self.rlp_encode())
    }

    /// RLP encodes the transaction.
    pub fn rlp_encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    /// Decodes a transaction from RLP bytes.
    pub fn rlp_decode(data: &[u8]) -> Result<Self> {
        Ok(rlp::decode(data)?)
    }
}

impl Encodable for Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.tx_type.as_byte());
        s.append(&self.nonce);
        s.append(&self.payload.to_vec());
    }
}

impl Decodable for Transaction {
    fn decode(rlp: &Rlp<'_>) -> std::result::Result<Self, DecoderError> {
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let tx_type = TxType::from_byte(rlp.val_at(0)?)
            .map_err(|_| DecoderError::Custom("unknown transaction type"))?;
        let payload: Vec<u8> = rlp.val_at(2)?;
        Ok(Self {
            tx_type,
            nonce: rlp.val_at(1)?,
            payload: Bytes::from(payload),
        })
    }
}

/// Root committed in a block header for an ordered transaction list.
///
/// Keccak256 over the concatenated transaction hashes; zero for an empty list.
pub fn transactions_root(transactions: &[Transaction]) -> H256 {
    if transactions.is_empty() {
        return H256::ZERO;
    }
    let hashes: Vec<H256> = transactions.iter().map(Transaction::hash).collect();
    let parts: Vec<&[u8]> = hashes.iter().map(|h| h.as_bytes()).collect();
    H256::keccak256_concat(&parts)
}

//! Block and BlockHeader types.
//!
//! A header is split in two parts:
//! - the *unsigned* fields (version through `next_bookkeeper`), whose Keccak256
//!   over RLP is the block hash every bookkeeper signs;
//! - the *witness* fields (`bookkeepers`, `sig_data`), filled in once a quorum
//!   of signatures has been collected. They are not part of the hash.

use crate::transaction::transactions_root;
use crate::{Address, Error, Result, Transaction, H256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use std::fmt;
use tally_crypto::PublicKey;

/// Current header version.
pub const HEADER_VERSION: u32 = 0;

/// A block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Header format version
    pub version: u32,
    /// Hash of the previous block (zero for genesis)
    pub prev_block_hash: H256,
    /// Root over the block's ordered transactions
    pub transactions_root: H256,
    /// Unix timestamp in seconds
    pub timestamp: u32,
    /// Block height (genesis is height 0)
    pub height: u32,
    /// Proposer-chosen nonce
    pub consensus_data: u64,
    /// Multi-signature address of the bookkeepers for the next height
    pub next_bookkeeper: Address,
    /// Bookkeepers that produced this block, in index order
    pub bookkeepers: Vec<PublicKey>,
    /// Signatures over [`BlockHeader::hash`], ordered by bookkeeper index
    pub sig_data: Vec<Vec<u8>>,
}

impl BlockHeader {
    /// Genesis header for the given bookkeeper set.
    pub fn genesis(timestamp: u32, bookkeepers: Vec<PublicKey>) -> Self {
        Self {
            version: HEADER_VERSION,
            prev_block_hash: H256::ZERO,
            transactions_root: H256::ZERO,
            timestamp,
            height: 0,
            consensus_data: 0,
            next_bookkeeper: Address::from_bookkeepers(&bookkeepers),
            bookkeepers,
            sig_data: Vec::new(),
        }
    }

    /// Keccak256 of the RLP-encoded unsigned fields.
    pub fn hash(&self) -> H256 {
        H256::keccak256(&self.unsigned_rlp())
    }

    /// RLP of the fields covered by the block hash.
    pub fn unsigned_rlp(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(7);
        self.append_unsigned(&mut s);
        s.out().to_vec()
    }

    fn append_unsigned(&self, s: &mut RlpStream) {
        s.append(&self.version);
        s.append(&self.prev_block_hash);
        s.append(&self.transactions_root);
        s.append(&self.timestamp);
        s.append(&self.height);
        s.append(&self.consensus_data);
        s.append(&self.next_bookkeeper);
    }

    /// RLP encodes the full header, witness fields included.
    pub fn rlp_encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    /// Decodes a header from RLP bytes.
    pub fn rlp_decode(data: &[u8]) -> Result<Self> {
        Ok(rlp::decode(data)?)
    }
}

impl Encodable for BlockHeader {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(9);
        self.append_unsigned(s);
        s.begin_list(self.bookkeepers.len());
        for key in &self.bookkeepers {
            s.append(&key.to_compressed().to_vec());
        }
        s.begin_list(self.sig_data.len());
        for sig in &self.sig_data {
            s.append(sig);
        }
    }
}

impl Decodable for BlockHeader {
    fn decode(rlp: &Rlp<'_>) -> std::result::Result<Self, DecoderError> {
        if rlp.item_count()? != 9 {
            return Err(DecoderError::RlpIncorrectListLen);
        }

        let raw_keys: Vec<Vec<u8>> = rlp.list_at(7)?;
        let bookkeepers = raw_keys
            .iter()
            .map(|k| PublicKey::from_sec1_bytes(k))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| DecoderError::Custom("invalid bookkeeper key"))?;

        Ok(Self {
            version: rlp.val_at(0)?,
            prev_block_hash: rlp.val_at(1)?,
            transactions_root: rlp.val_at(2)?,
            timestamp: rlp.val_at(3)?,
            height: rlp.val_at(4)?,
            consensus_data: rlp.val_at(5)?,
            next_bookkeeper: rlp.val_at(6)?,
            bookkeepers,
            sig_data: rlp.list_at(8)?,
        })
    }
}

impl fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Header(height={}, hash={}, prev={}, sigs={})",
            self.height,
            self.hash().short(),
            self.prev_block_hash.short(),
            self.sig_data.len()
        )
    }
}

/// A complete block with header and transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// Ordered transactions
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block.
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// Genesis block with no transactions.
    pub fn genesis(timestamp: u32, bookkeepers: Vec<PublicKey>) -> Self {
        Self::new(BlockHeader::genesis(timestamp, bookkeepers), Vec::new())
    }

    /// Block hash (hash of the unsigned header fields).
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    /// Block height.
    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Checks that the header commits to this block's transactions.
    pub fn validate_transactions_root(&self) -> Result<()> {
        let computed = transactions_root(&self.transactions);
        if computed != self.header.transactions_root {
            return Err(Error::InvalidBlock(format!(
                "transactions root mismatch: header {}, computed {}",
                self.header.transactions_root, computed
            )));
        }
        Ok(())
    }

    /// RLP encodes the block.
    pub fn rlp_encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    /// Decodes a block from RLP bytes.
    pub fn rlp_decode(data: &[u8]) -> Result<Self> {
        Ok(rlp::decode(data)?)
    }
}

impl Encodable for Block {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.header);
        s.append_list::<Transaction, _>(&self.transactions);
    }
}

impl Decodable for Block {
    fn decode(rlp: &Rlp<'_>) -> std::result::Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            header: rlp.val_at(0)?,
            transactions: rlp.list_at(1)?,
        })
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block(height={}, hash={}, txs={})",
            self.header.height,
            self.hash().short(),
            self.transactions.len()
        )
    }
}

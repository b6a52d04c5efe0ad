//! # Tally Types
//!
//! Core type definitions for the Tally bookkeeper chain.
//!
//! This crate provides the fundamental types used throughout Tally:
//! - [`H256`] - 32-byte Keccak256 hashes
//! - [`Address`] - 20-byte addresses, including bookkeeper multi-signature addresses
//! - [`Transaction`] - bookkeeping and regular transactions
//! - [`Block`] and [`BlockHeader`] - blocks sealed by an M-of-N bookkeeper signature set
//! - [`codec`] - little-endian var-int wire primitives used by consensus payloads
//!
//! ## Example
//!
//! ```rust
//! use tally_crypto::PrivateKey;
//! use tally_types::{Block, H256};
//!
//! let bookkeepers = vec![PrivateKey::random().public_key()];
//! let genesis = Block::genesis(1_700_000_000, bookkeepers);
//!
//! assert_eq!(genesis.height(), 0);
//! assert_eq!(genesis.header.prev_block_hash, H256::ZERO);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod address;
pub mod block;
pub mod codec;
pub mod hash;
pub mod transaction;

// Re-export main types at crate root
pub use address::Address;
pub use block::{Block, BlockHeader};
pub use codec::DecodeError;
pub use hash::H256;
pub use transaction::{transactions_root, Transaction, TxType};

/// Result type alias for Tally types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when working with Tally types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid hex string
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size type
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Invalid address format
    #[error("invalid address format: {0}")]
    InvalidAddress(String),

    /// Invalid hash format
    #[error("invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid transaction
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Invalid block
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    /// RLP decoding error
    #[error("RLP decode error: {0}")]
    RlpDecode(#[from] rlp::DecoderError),
}

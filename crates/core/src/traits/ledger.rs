//! Ledger (chain storage) trait.

use tally_types::{Block, BlockHeader, H256};
use thiserror::Error;

/// Errors returned when appending a block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The block does not extend the current head.
    #[error("block at height {height} does not extend head {head}")]
    NotChained {
        /// Height of the rejected block.
        height: u32,
        /// Current head hash.
        head: H256,
    },

    /// The block is already stored.
    #[error("block {0} already stored")]
    Duplicate(H256),

    /// The block's signatures do not form a quorum of its bookkeepers.
    #[error("invalid block signatures: {0}")]
    InvalidSignatures(String),

    /// The block body is inconsistent with its header.
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    /// Backend failure.
    #[error("ledger storage error: {0}")]
    Storage(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Read access to the chain head plus durable block append.
pub trait Ledger: Send + Sync {
    /// Hash of the highest stored block.
    fn current_block_hash(&self) -> H256;

    /// Height of the highest stored block.
    fn current_height(&self) -> u32;

    /// Look up a stored header.
    fn header_by_hash(&self, hash: &H256) -> Option<BlockHeader>;

    /// Whether a block with this hash is stored.
    fn contains_block(&self, hash: &H256) -> bool;

    /// Durably append a block on top of the current head.
    fn add_block(&self, block: Block) -> LedgerResult<()>;
}

//! Duplicate-transaction window over recently persisted blocks.
//!
//! The transaction pool only knows what was committed up to some height. The
//! increment validator remembers the transaction hashes of the last few
//! persisted blocks so a proposal can be checked against the gap between the
//! pool's view and the ledger head.

use std::collections::{HashSet, VecDeque};

use tally_types::{Block, Transaction, H256};
use thiserror::Error;
use tracing::{debug, info};

/// Rejections from [`IncrementValidator::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IncrementError {
    /// The requested start height has already been evicted from the window
    #[error("start height {start} is below window base {base}")]
    OutOfRange {
        /// Requested start height
        start: u32,
        /// Oldest height still held
        base: u32,
    },

    /// The transaction is already in a persisted block
    #[error("transaction {0} already persisted")]
    Duplicate(H256),
}

/// Sliding window of per-block transaction hash sets.
#[derive(Debug, Clone)]
pub struct IncrementValidator {
    blocks: VecDeque<HashSet<H256>>,
    base_height: u32,
    max_blocks: usize,
}

impl IncrementValidator {
    /// Window holding at most `max_blocks` blocks.
    pub fn new(max_blocks: usize) -> Self {
        Self {
            blocks: VecDeque::with_capacity(max_blocks + 1),
            base_height: 0,
            max_blocks: max_blocks.max(1),
        }
    }

    /// Half-open range of heights currently held.
    pub fn block_range(&self) -> (u32, u32) {
        (self.base_height, self.base_height + self.blocks.len() as u32)
    }

    /// True when no block is held.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Forget every block.
    pub fn clean(&mut self) {
        self.blocks.clear();
        self.base_height = 0;
    }

    /// Remember `block`'s transactions. A block that does not extend the
    /// window restarts it.
    pub fn add_block(&mut self, block: &Block) {
        let height = block.height();
        let (_, end) = self.block_range();
        if !self.blocks.is_empty() && end != height {
            debug!(height, end, "Increment window not contiguous, restarting");
            self.clean();
        }
        if self.blocks.is_empty() {
            self.base_height = height;
        }

        self.blocks
            .push_back(block.transactions.iter().map(Transaction::hash).collect());
        if self.blocks.len() > self.max_blocks {
            self.blocks.pop_front();
            self.base_height += 1;
        }
    }

    /// Reject `tx` if it appears in any held block at or above `start_height`.
    pub fn verify(&self, tx: &Transaction, start_height: u32) -> Result<(), IncrementError> {
        if start_height < self.base_height {
            return Err(IncrementError::OutOfRange {
                start: start_height,
                base: self.base_height,
            });
        }

        let hash = tx.hash();
        let skip = (start_height - self.base_height) as usize;
        if self.blocks.iter().skip(skip).any(|set| set.contains(&hash)) {
            return Err(IncrementError::Duplicate(hash));
        }
        Ok(())
    }

    /// Height from which the pool must check transactions when the ledger head
    /// is at `ledger_height`.
    ///
    /// When the window ends at the head, the pool only needs to cover heights
    /// before the window. Otherwise the window is stale and is cleared.
    pub fn valid_height(&mut self, ledger_height: u32) -> u32 {
        let (start, end) = self.block_range();
        if end == ledger_height + 1 {
            return start;
        }
        if !self.blocks.is_empty() {
            info!(
                window_end = end,
                ledger_height, "Increment window behind ledger, clearing"
            );
        }
        self.clean();
        ledger_height
    }
}

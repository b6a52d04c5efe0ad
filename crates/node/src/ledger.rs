//! In-memory chain storage.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tally_consensus::{ConsensusError, ServiceHandle};
use tally_core::traits::{Ledger, LedgerError, LedgerResult, Verifier};
use tally_crypto::bft_threshold;
use tally_types::{Address, Block, BlockHeader, H256};
use tracing::{debug, info, warn};

use crate::pool::MemoryTxPool;

struct Chain {
    blocks: Vec<Block>,
    by_hash: HashMap<H256, u32>,
}

/// Append-only chain held in memory.
///
/// Every appended block must extend the head, commit to its transactions and
/// carry an `M`-of-`N` multi-signature of the bookkeepers named by the
/// previous block's next-bookkeeper address.
pub struct MemoryLedger {
    chain: RwLock<Chain>,
    verifier: Arc<dyn Verifier>,
    pool: Option<Arc<MemoryTxPool>>,
    listener: RwLock<Option<ServiceHandle>>,
}

impl MemoryLedger {
    /// Ledger holding only `genesis`.
    pub fn new(genesis: Block, verifier: Arc<dyn Verifier>) -> Self {
        let mut by_hash = HashMap::new();
        by_hash.insert(genesis.hash(), 0);
        Self {
            chain: RwLock::new(Chain {
                blocks: vec![genesis],
                by_hash,
            }),
            verifier,
            pool: None,
            listener: RwLock::new(None),
        }
    }

    /// Drop committed transactions from `pool` on every append.
    pub fn with_pool(mut self, pool: Arc<MemoryTxPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Send `BlockPersisted` to `handle` after every append.
    pub fn set_listener(&self, handle: ServiceHandle) {
        *self.listener.write() = Some(handle);
    }

    /// Block at `height`, if stored.
    pub fn block_at(&self, height: u32) -> Option<Block> {
        self.chain.read().blocks.get(height as usize).cloned()
    }

    /// Highest stored block.
    pub fn head(&self) -> Block {
        let chain = self.chain.read();
        chain.blocks[chain.blocks.len() - 1].clone()
    }

    fn check(&self, head: &BlockHeader, block: &Block) -> LedgerResult<()> {
        let header = &block.header;
        if header.height != head.height + 1 || header.prev_block_hash != head.hash() {
            return Err(LedgerError::NotChained {
                height: header.height,
                head: head.hash(),
            });
        }
        if header.timestamp <= head.timestamp {
            return Err(LedgerError::InvalidBlock(format!(
                "timestamp {} not after parent {}",
                header.timestamp, head.timestamp
            )));
        }
        block
            .validate_transactions_root()
            .map_err(|e| LedgerError::InvalidBlock(e.to_string()))?;

        if Address::from_bookkeepers(&header.bookkeepers) != head.next_bookkeeper {
            return Err(LedgerError::InvalidSignatures(
                "bookkeepers do not match parent's next bookkeeper".into(),
            ));
        }
        let threshold = bft_threshold(header.bookkeepers.len());
        if !self.verifier.verify_multisig(
            &header.bookkeepers,
            threshold,
            block.hash().as_bytes(),
            &header.sig_data,
        ) {
            return Err(LedgerError::InvalidSignatures(format!(
                "need {} of {} bookkeeper signatures",
                threshold,
                header.bookkeepers.len()
            )));
        }
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    fn current_block_hash(&self) -> H256 {
        self.head().hash()
    }

    fn current_height(&self) -> u32 {
        let chain = self.chain.read();
        chain.blocks.len() as u32 - 1
    }

    fn header_by_hash(&self, hash: &H256) -> Option<BlockHeader> {
        let chain = self.chain.read();
        chain
            .by_hash
            .get(hash)
            .map(|h| chain.blocks[*h as usize].header.clone())
    }

    fn contains_block(&self, hash: &H256) -> bool {
        self.chain.read().by_hash.contains_key(hash)
    }

    fn add_block(&self, block: Block) -> LedgerResult<()> {
        let hash = block.hash();
        {
            let mut chain = self.chain.write();
            if chain.by_hash.contains_key(&hash) {
                return Err(LedgerError::Duplicate(hash));
            }
            let head = chain.blocks[chain.blocks.len() - 1].header.clone();
            self.check(&head, &block)?;

            chain.by_hash.insert(hash, block.height());
            chain.blocks.push(block.clone());
        }
        info!(
            height = block.height(),
            hash = %hash,
            txs = block.transactions.len(),
            "Block persisted"
        );

        if let Some(pool) = &self.pool {
            pool.remove_committed(&block.transactions);
        }
        self.notify(block);
        Ok(())
    }
}

impl MemoryLedger {
    /// Send `BlockPersisted` to the listener. `add_block` usually runs on the
    /// listener's own actor, so a full inbox is waited on from a spawned task.
    fn notify(&self, block: Block) {
        let Some(handle) = self.listener.read().clone() else {
            debug!("No consensus listener attached");
            return;
        };
        let height = block.height();
        match handle.try_block_persisted(block.clone()) {
            Ok(()) => {}
            Err(ConsensusError::InboxFull) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    debug!(height, "Consensus inbox full, deferring BlockPersisted");
                    runtime.spawn(async move {
                        if let Err(e) = handle.block_persisted(block).await {
                            warn!(height, error = %e, "Failed to notify consensus");
                        }
                    });
                }
                Err(_) => warn!(height, "Consensus inbox full outside a runtime"),
            },
            Err(e) => warn!(height, error = %e, "Failed to notify consensus of persisted block"),
        }
    }
}

//! In-memory transaction pool.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use tally_core::traits::{TxPool, TxPoolError, TxPoolResult};
use tally_types::{Transaction, H256};
use tracing::{debug, trace};

#[derive(Default)]
struct Queue {
    order: VecDeque<Transaction>,
    known: HashSet<H256>,
}

/// FIFO pool shared by every bookkeeper of a devnet.
///
/// There is no account state to check against, so `pending_transactions`
/// ignores its height argument and the pool only guards against duplicates.
#[derive(Default)]
pub struct MemoryTxPool {
    queue: Mutex<Queue>,
}

impl MemoryTxPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transaction. Bookkeeping transactions are only ever created by
    /// a proposer and are refused here.
    pub fn submit(&self, tx: Transaction) -> TxPoolResult<H256> {
        let hash = tx.hash();
        if tx.is_bookkeeping() {
            return Err(TxPoolError::InvalidTransaction {
                hash,
                reason: "bookkeeping transactions cannot be submitted".into(),
            });
        }
        let mut queue = self.queue.lock();
        if !queue.known.insert(hash) {
            return Err(TxPoolError::Duplicate(hash));
        }
        queue.order.push_back(tx);
        trace!(tx = %hash, "Transaction queued");
        Ok(hash)
    }

    /// Forget transactions included in a persisted block.
    pub fn remove_committed(&self, transactions: &[Transaction]) {
        let mut queue = self.queue.lock();
        let committed: HashSet<H256> = transactions
            .iter()
            .map(Transaction::hash)
            .filter(|h| queue.known.contains(h))
            .collect();
        if committed.is_empty() {
            return;
        }
        queue.order.retain(|tx| !committed.contains(&tx.hash()));
        for hash in &committed {
            queue.known.remove(hash);
        }
        debug!(removed = committed.len(), "Committed transactions dropped from pool");
    }

    /// Queued transaction count.
    pub fn len(&self) -> usize {
        self.queue.lock().order.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TxPool for MemoryTxPool {
    fn pending_transactions(&self, _min_height: u32) -> Vec<Transaction> {
        self.queue.lock().order.iter().cloned().collect()
    }

    fn verify_block(&self, transactions: &[Transaction], _height: u32) -> TxPoolResult<()> {
        let mut seen = HashSet::with_capacity(transactions.len());
        for (i, tx) in transactions.iter().enumerate() {
            let hash = tx.hash();
            if !seen.insert(hash) {
                return Err(TxPoolError::Duplicate(hash));
            }
            if tx.is_bookkeeping() != (i == 0) {
                return Err(TxPoolError::InvalidTransaction {
                    hash,
                    reason: "exactly one bookkeeping transaction, first".into(),
                });
            }
        }
        Ok(())
    }
}

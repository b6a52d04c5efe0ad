//! Transaction pool trait.

use tally_types::{Transaction, H256};
use thiserror::Error;

/// Errors returned by block-level transaction verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxPoolError {
    /// The same transaction appears more than once.
    #[error("duplicate transaction {0}")]
    Duplicate(H256),

    /// A transaction failed validation.
    #[error("invalid transaction {hash}: {reason}")]
    InvalidTransaction {
        /// Offending transaction.
        hash: H256,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type for pool operations.
pub type TxPoolResult<T> = Result<T, TxPoolError>;

/// Source of candidate transactions for proposals.
pub trait TxPool: Send + Sync {
    /// Transactions ready for inclusion, validated against state at or above `min_height`.
    fn pending_transactions(&self, min_height: u32) -> Vec<Transaction>;

    /// Verify a proposed transaction list as a whole.
    fn verify_block(&self, transactions: &[Transaction], height: u32) -> TxPoolResult<()>;
}

//! Bookkeeper election trait.

use tally_crypto::PublicKey;
use tally_types::Transaction;
use thiserror::Error;

/// Errors returned by the election function.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElectionError {
    /// No bookkeepers could be determined.
    #[error("empty bookkeeper set")]
    EmptySet,

    /// The vote state could not be read.
    #[error("election unavailable: {0}")]
    Unavailable(String),
}

/// Result type for election operations.
pub type ElectionResult<T> = Result<T, ElectionError>;

/// Computes who votes at the next height.
pub trait Election: Send + Sync {
    /// Ordered bookkeeper set resulting from applying `transactions`.
    ///
    /// An empty slice asks for the set in force at the current head.
    fn next_bookkeepers(&self, transactions: &[Transaction]) -> ElectionResult<Vec<PublicKey>>;
}

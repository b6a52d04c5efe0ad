//! Fixed bookkeeper set.

use tally_core::traits::{Election, ElectionError, ElectionResult};
use tally_crypto::PublicKey;
use tally_types::Transaction;

/// Election that always returns the genesis bookkeepers.
#[derive(Debug, Clone)]
pub struct StaticElection {
    bookkeepers: Vec<PublicKey>,
}

impl StaticElection {
    /// Elect `bookkeepers`, in this order, at every height.
    pub fn new(bookkeepers: Vec<PublicKey>) -> Self {
        Self { bookkeepers }
    }
}

impl Election for StaticElection {
    fn next_bookkeepers(&self, _transactions: &[Transaction]) -> ElectionResult<Vec<PublicKey>> {
        if self.bookkeepers.is_empty() {
            return Err(ElectionError::EmptySet);
        }
        Ok(self.bookkeepers.clone())
    }
}

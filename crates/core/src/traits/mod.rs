//! Collaborator traits consumed by the consensus service.
//!
//! The dBFT engine owns nothing but its round state. Everything else it needs
//! is reached through the narrow interfaces below:
//!
//! - **Crypto**: [`Signer`] for the local bookkeeper key, [`Verifier`] for peers
//! - **Ledger**: current head, header lookup, duplicate check, durable append
//! - **Pool**: candidate transactions and block-level transaction checks
//! - **Election**: the bookkeeper set for the next height
//! - **Transport**: best-effort broadcast of encoded consensus payloads
//!
//! All traits are synchronous and `Send + Sync`; the service calls them from
//! a single actor task and never holds a call open across an await point.

mod crypto;
mod election;
mod ledger;
mod pool;
mod transport;

pub use crypto::*;
pub use election::*;
pub use ledger::*;
pub use pool::*;
pub use transport::*;

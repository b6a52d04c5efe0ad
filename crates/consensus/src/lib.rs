//! # Tally Consensus
//!
//! dBFT (delegated Byzantine Fault Tolerance) consensus for the Tally
//! bookkeeper chain.
//!
//! A fixed, ordered set of `N` bookkeepers agrees on one block per height.
//! Each view has a single primary, `(height - view) mod N`, that proposes a
//! block; the others (backups) check it and sign. A block is final once
//! `M = N - floor((N - 1) / 3)` bookkeepers have signed its hash, so up to
//! `floor((N - 1) / 3)` faulty bookkeepers are tolerated. When the primary is
//! slow or faulty, bookkeepers announce a higher view and move on once `M` of
//! them agree.
//!
//! ## Consensus Flow
//!
//! ```text
//! Height h, view v:
//!
//! ┌──────────────────┐
//! │  PRIMARY         │  timer fires after the block interval
//! │                  │  broadcast PrepareRequest{nonce, next_bookkeeper, txs, sig}
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  BACKUPS         │  verify timestamp, primary signature, txs, next bookkeeper
//! │                  │  broadcast PrepareResponse{sig}
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  M SIGNATURES    │  Ledger::add_block(header + first M signatures)
//! │                  │  broadcast BlockSignatures{(sig, index)...}
//! └──────────────────┘
//!
//! Timer expires first:
//!   expected_view[self] += 1, broadcast ChangeView{expected}
//!   M bookkeepers expecting view v' ──► enter v', backoff block_interval << (v' + 1)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tally_consensus::{Collaborators, DbftService, ServiceConfig};
//!
//! let deps = Collaborators { ledger, pool, election, signer, verifier, broadcast };
//! let (handle, task) = DbftService::spawn(ServiceConfig::default(), deps);
//! handle.start().await?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod context;
pub mod increment;
pub mod message;
pub mod payload;
pub mod phase;
pub mod service;
pub mod timer;

pub use context::{primary_index_for, RoundContext};
pub use increment::{IncrementError, IncrementValidator};
pub use message::{
    BlockSignatures, ChangeView, ConsensusMessage, MessageBody, MessageType, PrepareRequest,
    PrepareResponse, SignatureEntry,
};
pub use payload::{ConsensusPayload, CONSENSUS_VERSION};
pub use phase::ConsensusPhase;
pub use service::{
    inbox, Collaborators, Command, ConsensusError, ConsensusResult, DbftService, ServiceConfig,
    ServiceHandle,
};
pub use timer::{view_timeout, RoundTimer, TimeoutInfo, TokioRoundTimer};

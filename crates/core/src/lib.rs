//! # Tally Core - Collaborator Abstractions
//!
//! This crate defines the interfaces through which the dBFT consensus service
//! reaches the rest of the node:
//!
//! | Concern | Trait | Default Impl |
//! |---------|-------|--------------|
//! | Local key | [`Signer`] | [`KeyPairSigner`] (secp256k1) |
//! | Peer signatures | [`Verifier`] | [`EcdsaVerifier`] |
//! | Chain storage | [`Ledger`] | in-memory ledger in `tally-node` |
//! | Transactions | [`TxPool`] | in-memory pool in `tally-node` |
//! | Next bookkeepers | [`Election`] | static set in `tally-node` |
//! | Network | [`Broadcast`] | loopback bus in `tally-node` |
//!
//! # Example
//!
//! ```rust
//! use tally_core::{EcdsaVerifier, KeyPairSigner, Signer, Verifier};
//!
//! let signer = KeyPairSigner::random();
//! let sig = signer.sign(b"header hash").unwrap();
//! assert!(EcdsaVerifier.verify(&signer.public_key(), b"header hash", &sig));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod traits;

pub use ecdsa::{EcdsaVerifier, KeyPairSigner};
pub use traits::{
    // Crypto
    CryptoError, CryptoResult, Signer, Verifier,
    // Election
    Election, ElectionError, ElectionResult,
    // Ledger
    Ledger, LedgerError, LedgerResult,
    // Pool
    TxPool, TxPoolError, TxPoolResult,
    // Transport
    Broadcast, TransportError, TransportResult,
};

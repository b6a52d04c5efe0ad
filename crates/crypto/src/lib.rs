//! # Tally Crypto
//!
//! Cryptographic primitives for the Tally bookkeeper chain.
//!
//! This crate provides:
//! - **Keccak256 hashing** for block, transaction and payload digests
//! - **ECDSA signatures** over secp256k1 for bookkeeper keys
//! - **M-of-N multi-signatures** used to seal blocks agreed by dBFT consensus
//!
//! ## Example
//!
//! ```rust
//! use tally_crypto::{keccak256, ecdsa::PrivateKey, multisig};
//!
//! let hash = keccak256(b"block header");
//!
//! let key = PrivateKey::random();
//! let signature = key.sign(&hash).unwrap();
//! assert!(signature.verify(&hash, &key.public_key()).unwrap());
//!
//! // Four bookkeepers tolerate one fault and need three signatures.
//! assert_eq!(multisig::bft_threshold(4), 3);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod ecdsa;
pub mod hash;
pub mod multisig;

pub use ecdsa::{PrivateKey, PublicKey, Signature};
pub use hash::{keccak256, keccak256_concat};
pub use multisig::{bft_threshold, verify_multisig};

/// Common type alias for 32-byte hash
pub type Hash = [u8; 32];

/// Error types for cryptographic operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Invalid private key bytes
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Invalid public key bytes
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid signature bytes
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Invalid input length
    #[error("invalid input length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected number of bytes
        expected: usize,
        /// Number of bytes supplied
        actual: usize,
    },

    /// Hex decoding error
    #[error("hex decoding error: {0}")]
    HexError(String),
}

impl From<hex::FromHexError> for CryptoError {
    fn from(e: hex::FromHexError) -> Self {
        CryptoError::HexError(e.to_string())
    }
}

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

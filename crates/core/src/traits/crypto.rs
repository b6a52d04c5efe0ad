//! Signing and verification traits.

use tally_crypto::PublicKey;
use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Error, Debug, Clone)]
pub enum CryptoError {
    /// The signer could not produce a signature.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The public key is malformed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

impl From<tally_crypto::CryptoError> for CryptoError {
    fn from(e: tally_crypto::CryptoError) -> Self {
        CryptoError::SigningFailed(e.to_string())
    }
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Holder of the local bookkeeper key.
///
/// Signatures are opaque byte strings to the consensus layer.
pub trait Signer: Send + Sync {
    /// Sign a message and return the encoded signature.
    fn sign(&self, message: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Public key of the local bookkeeper.
    fn public_key(&self) -> PublicKey;
}

/// Signature verification for peer bookkeepers.
pub trait Verifier: Send + Sync {
    /// Check one signature. Malformed signatures verify as `false`.
    fn verify(&self, pubkey: &PublicKey, message: &[u8], signature: &[u8]) -> bool;

    /// Check that at least `threshold` distinct keys of `pubkeys` signed `message`.
    fn verify_multisig(
        &self,
        pubkeys: &[PublicKey],
        threshold: usize,
        message: &[u8],
        signatures: &[Vec<u8>],
    ) -> bool;
}

//! secp256k1 ECDSA implementations of [`Signer`] and [`Verifier`].

use crate::traits::{CryptoResult, Signer, Verifier};
use tally_crypto::{PrivateKey, PublicKey, Signature};

/// [`Signer`] backed by an in-memory secp256k1 key.
#[derive(Debug, Clone)]
pub struct KeyPairSigner {
    key: PrivateKey,
    public: PublicKey,
}

impl KeyPairSigner {
    /// Wrap a private key.
    pub fn new(key: PrivateKey) -> Self {
        let public = key.public_key();
        Self { key, public }
    }

    /// Generate a fresh random key.
    pub fn random() -> Self {
        Self::new(PrivateKey::random())
    }
}

impl Signer for KeyPairSigner {
    fn sign(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(self.key.sign(message)?.to_bytes().to_vec())
    }

    fn public_key(&self) -> PublicKey {
        self.public
    }
}

/// Stateless secp256k1 [`Verifier`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaVerifier;

impl Verifier for EcdsaVerifier {
    fn verify(&self, pubkey: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
        match Signature::from_slice(signature) {
            Ok(sig) => matches!(sig.verify(message, pubkey), Ok(true)),
            Err(_) => false,
        }
    }

    fn verify_multisig(
        &self,
        pubkeys: &[PublicKey],
        threshold: usize,
        message: &[u8],
        signatures: &[Vec<u8>],
    ) -> bool {
        let parsed: Vec<Signature> = signatures
            .iter()
            .filter_map(|s| Signature::from_slice(s).ok())
            .collect();
        tally_crypto::verify_multisig(pubkeys, threshold, message, &parsed)
    }
}

//! Keccak256 digests.
//!
//! Block headers, transactions and consensus payload preimages are all hashed
//! with Keccak256 before being signed.

use sha3::{Digest, Keccak256};

/// Compute the Keccak256 hash of the input data.
///
/// # Example
///
/// ```rust
/// use tally_crypto::keccak256;
///
/// let hash = keccak256(b"hello");
/// assert_eq!(hash.len(), 32);
/// ```
#[inline]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the Keccak256 hash of several slices as if they were concatenated.
///
/// No temporary buffer is allocated.
#[inline]
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

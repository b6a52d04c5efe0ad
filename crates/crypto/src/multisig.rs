//! M-of-N multi-signature verification.
//!
//! A sealed block carries plain ECDSA signatures from at least `M` of the `N`
//! bookkeepers. There is no signature aggregation: each signature is checked
//! individually and matched to a distinct key.

use crate::ecdsa::{PublicKey, Signature};

/// Number of signatures needed to finalize a block among `n` bookkeepers.
///
/// `n - floor((n - 1) / 3)`, which tolerates `floor((n - 1) / 3)` faulty nodes.
/// Returns 0 for an empty set.
pub const fn bft_threshold(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    n - (n - 1) / 3
}

/// Check that `signatures` contains valid signatures over `message` from at
/// least `threshold` distinct keys in `pubkeys`.
///
/// Signatures that match no key, or match a key already counted, do not count.
/// A threshold of zero or above `pubkeys.len()` never verifies.
pub fn verify_multisig(
    pubkeys: &[PublicKey],
    threshold: usize,
    message: &[u8],
    signatures: &[Signature],
) -> bool {
    if threshold == 0 || threshold > pubkeys.len() {
        return false;
    }

    let mut used = vec![false; pubkeys.len()];
    let mut matched = 0usize;

    for signature in signatures {
        let hit = pubkeys.iter().enumerate().find(|(i, key)| {
            !used[*i] && matches!(signature.verify(message, key), Ok(true))
        });
        if let Some((i, _)) = hit {
            used[i] = true;
            matched += 1;
            if matched >= threshold {
                return true;
            }
        }
    }

    false
}

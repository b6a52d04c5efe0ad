//! Round phase flags.
//!
//! A round's phase is a set of independent flags rather than a single state:
//! the role (`PRIMARY` or `BACKUP`) coexists with progress flags such as
//! `REQUEST_SENT` or `SIGNATURE_SENT`. `BLOCK_GENERATED` is terminal for the
//! height.

use std::fmt;

/// Bit-set of round phase flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConsensusPhase(u8);

impl ConsensusPhase {
    /// No flags set
    pub const INITIAL: Self = Self(0x00);
    /// This node proposes in the current view
    pub const PRIMARY: Self = Self(0x01);
    /// This node validates the primary's proposal
    pub const BACKUP: Self = Self(0x02);
    /// The primary has broadcast its PrepareRequest
    pub const REQUEST_SENT: Self = Self(0x04);
    /// A backup has accepted the primary's PrepareRequest
    pub const REQUEST_RECEIVED: Self = Self(0x08);
    /// This node has signed the proposed block
    pub const SIGNATURE_SENT: Self = Self(0x10);
    /// The block for this height was appended to the ledger
    pub const BLOCK_GENERATED: Self = Self(0x20);

    const NAMED: [(Self, &'static str); 6] = [
        (Self::PRIMARY, "Primary"),
        (Self::BACKUP, "Backup"),
        (Self::REQUEST_SENT, "RequestSent"),
        (Self::REQUEST_RECEIVED, "RequestReceived"),
        (Self::SIGNATURE_SENT, "SignatureSent"),
        (Self::BLOCK_GENERATED, "BlockGenerated"),
    ];

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when no flag is set.
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }

    /// Set the flags in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the flags in `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Keep only the flags that are also in `mask`.
    pub fn narrow_to(&mut self, mask: Self) {
        self.0 &= mask.0;
    }
}

impl std::ops::BitOr for ConsensusPhase {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ConsensusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_initial() {
            return f.write_str("Initial");
        }
        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ConsensusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsensusPhase(0x{:02x}: {})", self.0, self)
    }
}

//! Little-endian wire codec primitives.
//!
//! Consensus payloads use a compact binary layout: fixed-width little-endian
//! integers, and variable-length byte strings prefixed with a var-int:
//!
//! | Value            | Encoding              |
//! |------------------|-----------------------|
//! | `< 0xFD`         | 1 byte                |
//! | `<= 0xFFFF`      | `0xFD` + `u16` LE     |
//! | `<= 0xFFFF_FFFF` | `0xFE` + `u32` LE     |
//! | otherwise        | `0xFF` + `u64` LE     |
//!
//! Readers operate on any [`bytes::Buf`] and never read past its end: every
//! read checks `remaining()` first and reports [`DecodeError::TruncatedInput`].

use bytes::{Buf, BufMut};

/// Upper bound on a single var-bytes field, so a hostile length prefix cannot
/// trigger a huge allocation.
pub const MAX_VAR_BYTES: u64 = 16 * 1024 * 1024;

/// Errors produced while decoding wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A field read would run past the end of the input
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput {
        /// Bytes required by the field
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// The message discriminant is not a known consensus message
    #[error("unknown message type: 0x{0:02x}")]
    UnknownMessageType(u8),

    /// A length prefix or fixed-size field has an invalid length
    #[error("invalid length: {0}")]
    InvalidLength(String),

    /// Input continued after a complete value
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    /// An embedded public key is not a valid secp256k1 point
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// An embedded value failed its own decoding
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Why decoding failed
        reason: String,
    },
}

/// Result type for wire decoding.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

fn ensure<B: Buf>(buf: &B, needed: usize) -> DecodeResult<()> {
    if buf.remaining() < needed {
        return Err(DecodeError::TruncatedInput {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Check that a length or count read off the wire fits in what is left.
pub fn ensure_claimed<B: Buf>(buf: &B, claimed: u64) -> DecodeResult<usize> {
    let needed = usize::try_from(claimed).unwrap_or(usize::MAX);
    ensure(buf, needed)?;
    Ok(needed)
}

/// Read a single byte.
pub fn read_u8<B: Buf>(buf: &mut B) -> DecodeResult<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

/// Read a little-endian `u16`.
pub fn read_u16<B: Buf>(buf: &mut B) -> DecodeResult<u16> {
    ensure(buf, 2)?;
    Ok(buf.get_u16_le())
}

/// Read a little-endian `u32`.
pub fn read_u32<B: Buf>(buf: &mut B) -> DecodeResult<u32> {
    ensure(buf, 4)?;
    Ok(buf.get_u32_le())
}

/// Read a little-endian `u64`.
pub fn read_u64<B: Buf>(buf: &mut B) -> DecodeResult<u64> {
    ensure(buf, 8)?;
    Ok(buf.get_u64_le())
}

/// Read exactly `N` bytes.
pub fn read_array<const N: usize, B: Buf>(buf: &mut B) -> DecodeResult<[u8; N]> {
    ensure(buf, N)?;
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Read a var-int.
pub fn read_var_uint<B: Buf>(buf: &mut B) -> DecodeResult<u64> {
    match read_u8(buf)? {
        0xFD => read_u16(buf).map(u64::from),
        0xFE => read_u32(buf).map(u64::from),
        0xFF => read_u64(buf),
        small => Ok(u64::from(small)),
    }
}

/// Read a var-int length prefix followed by that many bytes.
pub fn read_var_bytes<B: Buf>(buf: &mut B) -> DecodeResult<Vec<u8>> {
    let claimed = read_var_uint(buf)?;
    let len = ensure_claimed(buf, claimed)?;
    if claimed > MAX_VAR_BYTES {
        return Err(DecodeError::InvalidLength(format!(
            "var-bytes length {} exceeds {}",
            claimed, MAX_VAR_BYTES
        )));
    }
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Fail with [`DecodeError::TrailingBytes`] unless the buffer is exhausted.
pub fn expect_end<B: Buf>(buf: &B) -> DecodeResult<()> {
    match buf.remaining() {
        0 => Ok(()),
        n => Err(DecodeError::TrailingBytes(n)),
    }
}

/// Write a var-int.
pub fn write_var_uint<B: BufMut>(buf: &mut B, value: u64) {
    if value < 0xFD {
        buf.put_u8(value as u8);
    } else if value <= 0xFFFF {
        buf.put_u8(0xFD);
        buf.put_u16_le(value as u16);
    } else if value <= 0xFFFF_FFFF {
        buf.put_u8(0xFE);
        buf.put_u32_le(value as u32);
    } else {
        buf.put_u8(0xFF);
        buf.put_u64_le(value);
    }
}

/// Write a var-int length prefix followed by `data`.
pub fn write_var_bytes<B: BufMut>(buf: &mut B, data: &[u8]) {
    write_var_uint(buf, data.len() as u64);
    buf.put_slice(data);
}

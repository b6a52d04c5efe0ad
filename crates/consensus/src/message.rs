//! dBFT consensus messages and their wire codec.
//!
//! Every message starts with a two byte header, `type | view`, followed by the
//! body of its variant:
//!
//! | Type | Name              | Body                                                      |
//! |------|-------------------|-----------------------------------------------------------|
//! | 0x00 | `ChangeView`      | `new_view:u8`                                             |
//! | 0x01 | `BlockSignatures` | `count:var-uint`, then `(signature:var-bytes, index:u16)`  |
//! | 0x20 | `PrepareRequest`  | `nonce:u64 | next_bookkeeper:20B | txs | signature`        |
//! | 0x21 | `PrepareResponse` | `signature:var-bytes`                                     |
//!
//! Transactions in a `PrepareRequest` are a var-uint count followed by each
//! transaction's RLP as var-bytes.

use std::fmt;

use bytes::Buf;
use tally_types::codec::{
    ensure_claimed, expect_end, read_array, read_u16, read_u64, read_u8, read_var_bytes, read_var_uint,
    write_var_bytes, write_var_uint, DecodeError, DecodeResult,
};
use tally_types::{Address, Transaction};

/// Message discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Request to move to a higher view
    ChangeView = 0x00,
    /// Quorum signatures gossiped after a block is generated
    BlockSignatures = 0x01,
    /// Primary's block proposal
    PrepareRequest = 0x20,
    /// Backup's signature over the proposal
    PrepareResponse = 0x21,
}

impl MessageType {
    /// Wire byte.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = DecodeError;

    fn try_from(byte: u8) -> DecodeResult<Self> {
        match byte {
            0x00 => Ok(Self::ChangeView),
            0x01 => Ok(Self::BlockSignatures),
            0x20 => Ok(Self::PrepareRequest),
            0x21 => Ok(Self::PrepareResponse),
            other => Err(DecodeError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ChangeView => "ChangeView",
            Self::BlockSignatures => "BlockSignatures",
            Self::PrepareRequest => "PrepareRequest",
            Self::PrepareResponse => "PrepareResponse",
        };
        f.write_str(name)
    }
}

/// One `(signature, bookkeeper index)` pair in a `BlockSignatures` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    /// Signature over the block hash
    pub signature: Vec<u8>,
    /// Index of the signing bookkeeper
    pub index: u16,
}

/// Request to move to a higher view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeView {
    /// View the sender expects next
    pub new_view_number: u8,
}

/// The primary's proposal for its view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareRequest {
    /// Proposer-chosen nonce, stored as the header's consensus data
    pub nonce: u64,
    /// Multi-signature address of the next bookkeeper set
    pub next_bookkeeper: Address,
    /// Proposed transactions, bookkeeping transaction first
    pub transactions: Vec<Transaction>,
    /// Primary's signature over the resulting block hash
    pub signature: Vec<u8>,
}

/// A backup's signature over the proposed block hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareResponse {
    /// Signature over the block hash
    pub signature: Vec<u8>,
}

/// Signatures collected by a node that generated the block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockSignatures {
    /// Collected signatures with their signer indexes
    pub entries: Vec<SignatureEntry>,
}

/// Variant-specific message contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// See [`ChangeView`]
    ChangeView(ChangeView),
    /// See [`PrepareRequest`]
    PrepareRequest(PrepareRequest),
    /// See [`PrepareResponse`]
    PrepareResponse(PrepareResponse),
    /// See [`BlockSignatures`]
    BlockSignatures(BlockSignatures),
}

/// A consensus message: common header plus variant body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusMessage {
    /// The sender's view when it built the message
    pub view_number: u8,
    /// Variant body
    pub body: MessageBody,
}

impl ConsensusMessage {
    /// Build a message for `view_number`.
    pub fn new(view_number: u8, body: MessageBody) -> Self {
        Self { view_number, body }
    }

    /// Discriminant of the body.
    pub fn message_type(&self) -> MessageType {
        match self.body {
            MessageBody::ChangeView(_) => MessageType::ChangeView,
            MessageBody::BlockSignatures(_) => MessageType::BlockSignatures,
            MessageBody::PrepareRequest(_) => MessageType::PrepareRequest,
            MessageBody::PrepareResponse(_) => MessageType::PrepareResponse,
        }
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.push(self.message_type().as_byte());
        out.push(self.view_number);

        match &self.body {
            MessageBody::ChangeView(cv) => out.push(cv.new_view_number),
            MessageBody::PrepareRequest(req) => {
                out.extend_from_slice(&req.nonce.to_le_bytes());
                out.extend_from_slice(req.next_bookkeeper.as_bytes());
                write_var_uint(&mut out, req.transactions.len() as u64);
                for tx in &req.transactions {
                    write_var_bytes(&mut out, &tx.rlp_encode());
                }
                write_var_bytes(&mut out, &req.signature);
            }
            MessageBody::PrepareResponse(resp) => write_var_bytes(&mut out, &resp.signature),
            MessageBody::BlockSignatures(sigs) => {
                write_var_uint(&mut out, sigs.entries.len() as u64);
                for entry in &sigs.entries {
                    write_var_bytes(&mut out, &entry.signature);
                    out.extend_from_slice(&entry.index.to_le_bytes());
                }
            }
        }

        out
    }

    /// Parse wire bytes. The whole input must be consumed.
    pub fn decode(data: &[u8]) -> DecodeResult<Self> {
        let mut buf = data;
        let message_type = MessageType::try_from(read_u8(&mut buf)?)?;
        let view_number = read_u8(&mut buf)?;

        let body = match message_type {
            MessageType::ChangeView => MessageBody::ChangeView(ChangeView {
                new_view_number: read_u8(&mut buf)?,
            }),
            MessageType::PrepareRequest => {
                let nonce = read_u64(&mut buf)?;
                let next_bookkeeper = Address::from(read_array::<20, _>(&mut buf)?);
                let count = read_count(&mut buf)?;
                let mut transactions = Vec::with_capacity(count);
                for _ in 0..count {
                    let raw = read_var_bytes(&mut buf)?;
                    let tx = Transaction::rlp_decode(&raw).map_err(|e| {
                        DecodeError::InvalidField {
                            field: "transactions",
                            reason: e.to_string(),
                        }
                    })?;
                    transactions.push(tx);
                }
                MessageBody::PrepareRequest(PrepareRequest {
                    nonce,
                    next_bookkeeper,
                    transactions,
                    signature: read_var_bytes(&mut buf)?,
                })
            }
            MessageType::PrepareResponse => MessageBody::PrepareResponse(PrepareResponse {
                signature: read_var_bytes(&mut buf)?,
            }),
            MessageType::BlockSignatures => {
                let count = read_count(&mut buf)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let signature = read_var_bytes(&mut buf)?;
                    let index = read_u16(&mut buf)?;
                    entries.push(SignatureEntry { signature, index });
                }
                MessageBody::BlockSignatures(BlockSignatures { entries })
            }
        };

        expect_end(&buf)?;
        Ok(Self { view_number, body })
    }
}

/// Element count prefix. Every element takes at least one byte, so a count
/// larger than the remaining input is truncated before allocating.
fn read_count<B: Buf>(buf: &mut B) -> DecodeResult<usize> {
    let count = read_var_uint(buf)?;
    ensure_claimed(buf, count)
}

impl fmt::Display for ConsensusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(view={}", self.message_type(), self.view_number)?;
        match &self.body {
            MessageBody::ChangeView(cv) => write!(f, ", new_view={}", cv.new_view_number)?,
            MessageBody::PrepareRequest(req) => write!(f, ", txs={}", req.transactions.len())?,
            MessageBody::PrepareResponse(_) => {}
            MessageBody::BlockSignatures(sigs) => write!(f, ", sigs={}", sigs.entries.len())?,
        }
        write!(f, ")")
    }
}

//! Consensus payload broadcast trait.

use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while broadcasting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport has shut down.
    #[error("transport not running")]
    NotRunning,

    /// The payload could not be queued.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Best-effort delivery of an encoded consensus payload to every peer.
pub trait Broadcast: Send + Sync {
    /// Send `payload` to all other bookkeepers. Delivery is not acknowledged.
    fn broadcast(&self, payload: Bytes) -> TransportResult<()>;
}

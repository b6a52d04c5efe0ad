//! In-process broadcast bus.
//!
//! Every bookkeeper of a devnet registers its service handle on one
//! [`LoopbackBus`]. A node's [`LoopbackBroadcast`] hands each encoded payload
//! to every other registered inbox without blocking the sender's actor.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tally_consensus::{ConsensusError, ServiceHandle};
use tally_core::traits::{Broadcast, TransportError, TransportResult};
use tracing::{trace, warn};

/// Registry of service inboxes.
#[derive(Default)]
pub struct LoopbackBus {
    peers: RwLock<Vec<ServiceHandle>>,
}

impl LoopbackBus {
    /// Empty bus.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a peer; returns its slot on the bus.
    pub fn register(&self, handle: ServiceHandle) -> usize {
        let mut peers = self.peers.write();
        peers.push(handle);
        peers.len() - 1
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// True when no peer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn deliver(&self, from: usize, payload: &[u8]) -> TransportResult<()> {
        let peers = self.peers.read();
        if peers.is_empty() {
            return Err(TransportError::NotRunning);
        }
        for (slot, peer) in peers.iter().enumerate() {
            if slot == from {
                continue;
            }
            match peer.try_deliver_raw(payload) {
                Ok(()) => trace!(from, to = slot, "Payload delivered"),
                Err(ConsensusError::Decode(e)) => {
                    return Err(TransportError::SendFailed(e.to_string()))
                }
                Err(e) => warn!(from, to = slot, error = %e, "Dropping payload for peer"),
            }
        }
        Ok(())
    }
}

/// Broadcast side of one bus slot.
#[derive(Clone)]
pub struct LoopbackBroadcast {
    bus: Arc<LoopbackBus>,
    slot: usize,
}

impl LoopbackBroadcast {
    /// Sender occupying `slot` on `bus`.
    pub fn new(bus: Arc<LoopbackBus>, slot: usize) -> Self {
        Self { bus, slot }
    }
}

impl Broadcast for LoopbackBroadcast {
    fn broadcast(&self, payload: Bytes) -> TransportResult<()> {
        self.bus.deliver(self.slot, &payload)
    }
}

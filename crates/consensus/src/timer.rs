//! Round timer.
//!
//! The service keeps a single timer that it re-arms after every transition.
//! Each arming is tagged with the `(height, view)` it was armed for; when it
//! fires the service compares the tag with its current round and ignores
//! stale ticks.
//!
//! Backoff is exponential in the view number: `block_interval << (view + 1)`,
//! saturated at a configured cap so high views cannot overflow.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::service::Command;

/// Tag carried by a timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutInfo {
    /// Height the timer was armed for
    pub height: u32,
    /// View the timer was armed for
    pub view: u8,
}

/// Single-shot timer feeding the service inbox.
pub trait RoundTimer: Send {
    /// Fire a [`TimeoutInfo`] for `(height, view)` after `after`, replacing
    /// any pending deadline.
    fn arm(&mut self, height: u32, view: u8, after: Duration);

    /// Drop any pending deadline.
    fn cancel(&mut self);
}

/// `block_interval << (view + 1)`, saturated at `cap`.
pub fn view_timeout(block_interval: Duration, view: u8, cap: Duration) -> Duration {
    1u32.checked_shl(u32::from(view) + 1)
        .and_then(|factor| block_interval.checked_mul(factor))
        .map_or(cap, |timeout| timeout.min(cap))
}

/// [`RoundTimer`] backed by a tokio sleep task.
pub struct TokioRoundTimer {
    inbox: mpsc::Sender<Command>,
    pending: Option<JoinHandle<()>>,
}

impl TokioRoundTimer {
    /// Timer that delivers ticks into `inbox`.
    pub fn new(inbox: mpsc::Sender<Command>) -> Self {
        Self {
            inbox,
            pending: None,
        }
    }
}

impl RoundTimer for TokioRoundTimer {
    fn arm(&mut self, height: u32, view: u8, after: Duration) {
        self.cancel();
        trace!(height, view, after_ms = after.as_millis() as u64, "Arming round timer");

        let inbox = self.inbox.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // The inbox is gone once the service has stopped.
            let _ = inbox.send(Command::Timeout(TimeoutInfo { height, view })).await;
        }));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for TokioRoundTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! Security event fan-out for the session layer.
//!
//! Out-of-band signals the UI shell reacts to (toast a renewal warning,
//! hard-redirect to login on termination). Session STATE changes flow
//! through the store's synchronous listeners instead; this channel is for
//! events that are not derivable from two consecutive snapshots.

use std::sync::mpsc::Receiver;
use std::sync::{mpsc, Mutex};
use std::time::Duration;

/// Why an authenticated session was terminated without user intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Background renewal failed the configured number of times in a row.
    RenewalExhausted,
    /// The provider declared the session fatally invalid.
    ValidationFailed,
    /// The durable token entry vanished while the session claimed to be
    /// authenticated.
    Tampering,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    /// A background renewal attempt failed; the session survives until
    /// `attempt` reaches `max`.
    RenewalFailed { attempt: u32, max: u32 },
    /// The session was cleared without the user asking for it.
    SessionTerminated { reason: TerminationReason },
    /// External interference with durable storage was detected. Followed
    /// by a `SessionTerminated { reason: Tampering }`.
    TamperDetected,
}

/// A subscription to the security event stream.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next event is available.
    pub fn recv(&self) -> Result<M, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Result<M, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for an event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Best-effort broadcast channel for [`SecurityEvent`]s.
///
/// Every subscriber gets a copy of every event published after it
/// subscribed. Dead subscribers are dropped during publishing.
#[derive(Debug, Default)]
pub struct SecurityEvents {
    subscribers: Mutex<Vec<mpsc::Sender<SecurityEvent>>>,
}

impl SecurityEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: SecurityEvent) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    pub fn subscribe(&self) -> Subscription<SecurityEvent> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        Subscription::new(rx)
    }
}

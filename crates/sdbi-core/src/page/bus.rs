//! Signal bus using tokio broadcast channel
//!
//! Provides non-blocking signal emission with multiple subscribers.
//! Slow subscribers will miss signals rather than blocking senders.

use crate::page::ExitSignal;
use tokio::sync::broadcast;

/// Default channel capacity
const DEFAULT_CAPACITY: usize = 64;

/// Broadcast bus for exit-intent signals
///
/// Uses tokio broadcast channel internally. Signals are fire-and-forget;
/// if no subscribers are listening, signals are simply dropped.
pub struct SignalBus {
    sender: broadcast::Sender<ExitSignal>,
}

impl SignalBus {
    /// Create a new signal bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new signal bus with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to signals
    ///
    /// Returns a receiver that will get all signals emitted after
    /// subscription. If the receiver falls behind, it will miss signals.
    pub fn subscribe(&self) -> SignalSubscriber {
        SignalSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Emit a signal to all subscribers
    ///
    /// This is non-blocking and will not fail. If there are no subscribers,
    /// the signal is simply dropped.
    pub fn emit(&self, signal: ExitSignal) {
        let _ = self.sender.send(signal);
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SignalBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Subscriber to the signal bus
pub struct SignalSubscriber {
    receiver: broadcast::Receiver<ExitSignal>,
}

impl SignalSubscriber {
    /// Receive the next signal
    ///
    /// Returns None if the bus was dropped.
    pub async fn recv(&mut self) -> Option<ExitSignal> {
        loop {
            match self.receiver.recv().await {
                Ok(signal) => return Some(signal),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Signal subscriber lagged by {} signals", n);
                    continue;
                }
            }
        }
    }

    /// Try to receive a signal without blocking
    pub fn try_recv(&mut self) -> Option<ExitSignal> {
        self.receiver.try_recv().ok()
    }
}

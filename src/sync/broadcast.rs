/**
 * Sync Event Broadcasting
 *
 * Sync events are fanned out over a `tokio::sync::broadcast` channel. Every
 * subscriber receives its own copy of each event; a slow subscriber that
 * falls more than the channel capacity behind skips the oldest events
 * instead of blocking the drain pass.
 *
 * A subscription ends when its [`EventSubscription`] is dropped or
 * [`EventSubscription::unsubscribe`] is called.
 */
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::shared::event::SyncEvent;

/// Events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Multi-subscriber sync event channel
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Broadcast `event`, returns how many subscribers got it
    pub fn emit(&self, event: SyncEvent) -> usize {
        match self.tx.send(event) {
            Ok(subscriber_count) => {
                tracing::trace!("[Sync] Event broadcast to {} subscribers", subscriber_count);
                subscriber_count
            }
            Err(_) => {
                // No subscribers, that's okay
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of an [`EventBus`]
#[derive(Debug)]
pub struct EventSubscription {
    rx: broadcast::Receiver<SyncEvent>,
}

impl EventSubscription {
    /// Next event, `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("[Sync] Subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next buffered event without waiting
    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("[Sync] Subscriber lagged, skipped {} events", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain every buffered event
    pub fn drain(&mut self) -> Vec<SyncEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Stop receiving events
    pub fn unsubscribe(self) {}
}

//! # Event bus.
//!
//! [`Bus`] carries [`Event`]s from their sources (supervisor operations, the retire
//! callback of every monitor, subscriber workers reporting panics) to whoever listens.
//! The builder's listener is the usual receiver; it hands each event to the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! Publishing never waits. The channel keeps the last `capacity` events; a receiver
//! that falls further behind skips the oldest ones. Events published while nobody
//! listens are gone.

use tokio::sync::broadcast;
use tracing::trace;

use super::event::Event;

/// Cloneable handle to the runtime event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus retaining up to `capacity` undelivered events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes `ev`, returning how many receivers will see it.
    pub fn publish(&self, ev: Event) -> usize {
        let (seq, kind) = (ev.seq, ev.kind);
        match self.tx.send(ev) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!(seq, ?kind, "event published with no listener");
                0
            }
        }
    }

    /// Opens a receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of open receivers.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

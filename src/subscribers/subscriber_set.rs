//! # Event delivery to subscribers.
//!
//! [`SubscriberSet`] owns one route per subscriber: a bounded queue, a worker draining it
//! and a counter of events dropped on the way.
//!
//! ```text
//! dispatch(event)
//!   for each route whose subscriber accepts(event.kind):
//!     try_send ─ ok ───────► worker ─► on_event()  (panic ─► SubscriberPanicked)
//!              └ full/closed ─► dropped += 1, warn!, SubscriberOverflow
//! ```
//!
//! Each subscriber sees the events it accepts in publish order. There is no ordering
//! across subscribers, and `dispatch` never waits for any of them.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::events::{Bus, Event};
use crate::monitor::panic_message;
use crate::subscribers::Subscribe;

struct Route {
    sub: Arc<dyn Subscribe>,
    queue: mpsc::Sender<Arc<Event>>,
    dropped: AtomicU64,
}

/// Routes runtime events to their subscribers.
pub struct SubscriberSet {
    routes: Vec<Route>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one delivery worker per subscriber. Must be called inside a Tokio runtime.
    ///
    /// Panics and overflows are reported back on `bus`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (routes, workers) = subs
            .into_iter()
            .map(|sub| {
                let (queue, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let worker = tokio::spawn(deliver(Arc::clone(&sub), rx, bus.clone()));
                let route = Route {
                    sub,
                    queue,
                    dropped: AtomicU64::new(0),
                };
                (route, worker)
            })
            .unzip();

        Self {
            routes,
            workers,
            bus,
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// `true` when no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Subscriber names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.routes.iter().map(|r| r.sub.name()).collect()
    }

    /// Events dropped so far for `subscriber`; `None` if no such subscriber.
    pub fn dropped(&self, subscriber: &str) -> Option<u64> {
        self.routes
            .iter()
            .find(|r| r.sub.name() == subscriber)
            .map(|r| r.dropped.load(Ordering::Relaxed))
    }

    /// Queues `event` for every subscriber that accepts its kind.
    pub fn dispatch(&self, event: Event) {
        let event = Arc::new(event);
        for route in self.routes.iter().filter(|r| r.sub.accepts(event.kind)) {
            let reason = match route.queue.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            let dropped = route.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                subscriber = route.sub.name(),
                reason,
                seq = event.seq,
                kind = ?event.kind,
                dropped,
                "event dropped"
            );
            // Overflow reports are not themselves reported.
            if !event.is_subscriber_overflow() {
                self.bus
                    .publish(Event::subscriber_overflow(route.sub.name(), reason));
            }
        }
    }

    /// Closes every queue and waits until each worker delivered what was already queued.
    pub async fn shutdown(self) {
        drop(self.routes);
        for res in join_all(self.workers).await {
            if let Err(err) = res {
                debug!(error = %err, "subscriber worker ended abnormally");
            }
        }
    }
}

/// Worker loop for one subscriber.
async fn deliver(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await;
        if let Err(panic) = handled {
            let info = panic_message(panic.as_ref());
            error!(subscriber = sub.name(), seq = ev.seq, %info, "subscriber panicked");
            bus.publish(Event::subscriber_panicked(sub.name(), info));
        }
    }
}

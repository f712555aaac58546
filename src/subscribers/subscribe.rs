//! # Subscriber contract.
//!
//! A subscriber is a notification collaborator: it turns task lifecycle events into
//! emails, audit rows or dashboard updates. The engine never waits for it; each one is
//! fed through its own bounded queue by the [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! A subscriber only receives the kinds it [`accepts`](Subscribe::accepts). Events that
//! do not fit in its queue are dropped for that subscriber alone and reported as
//! [`EventKind::SubscriberOverflow`].
//!
//! ## Example
//! ```rust
//! use taskmon::{Event, EventKind, Subscribe};
//!
//! /// Mails the operators when a job ends badly.
//! struct FailureMailer;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for FailureMailer {
//!     async fn on_event(&self, ev: &Event) {
//!         let _subject = format!("{} failed at {:?}%", ev.task.as_deref().unwrap_or("?"), ev.percentage);
//!         // hand the message to the mail relay...
//!     }
//!
//!     fn name(&self) -> &'static str { "failure-mailer" }
//!
//!     fn accepts(&self, kind: EventKind) -> bool {
//!         matches!(kind, EventKind::TaskFailed | EventKind::JobAborted)
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Consumer of runtime events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Runs on the subscriber's own worker; a panic here is caught.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and overflow/panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Whether events of `kind` should be queued for this subscriber at all.
    fn accepts(&self, _kind: EventKind) -> bool {
        true
    }

    /// Capacity of the subscriber's queue (at least 1 is used).
    fn queue_capacity(&self) -> usize {
        1024
    }
}

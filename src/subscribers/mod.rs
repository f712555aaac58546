//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`] (feature `logging`).
//!
//! ## Architecture
//! ```text
//! Supervisor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::dispatch(Event)
//!                                                           │
//!                                          ┌────────────────┼────────────────┐
//!                                          ▼                ▼                ▼
//!                                      LogWriter        Mailer           Custom
//! ```
//!
//! Subscribers are how the engine reaches notification collaborators (emails, audit
//! rows, dashboards) without depending on them.

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;

//! # Completion callbacks.
//!
//! A [`MonitorCallback`] is notified exactly once, when the monitor reaches its terminal
//! state. Callbacks run on the worker (or synchronously inside
//! [`TaskMonitor::register_callback`](crate::TaskMonitor::register_callback) when the
//! monitor is already terminal), after the transition lock has been released.
//!
//! They should be quick: publish an event, enqueue a job, record a row.

use crate::error::TaskError;
use crate::monitor::TaskMonitor;

/// Receiver of a monitor's terminal transition.
///
/// Every method has an empty default; implement the ones you need.
///
/// ## Example
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use taskmon::{MonitorCallback, TaskError, TaskMonitor};
///
/// #[derive(Default)]
/// struct FailureCounter(AtomicUsize);
///
/// impl MonitorCallback for FailureCounter {
///     fn on_failure(&self, _monitor: &TaskMonitor, _error: &TaskError) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait MonitorCallback: Send + Sync + 'static {
    /// The task finished without error.
    fn on_success(&self, monitor: &TaskMonitor) {
        let _ = monitor;
    }

    /// The task failed (error without the cancellation marker, or a panic).
    fn on_failure(&self, monitor: &TaskMonitor, error: &TaskError) {
        let _ = (monitor, error);
    }

    /// The task detected a cancellation request and stopped.
    fn on_cancel(&self, monitor: &TaskMonitor) {
        let _ = monitor;
    }
}

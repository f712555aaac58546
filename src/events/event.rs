//! # Runtime events emitted by the supervisor and monitors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Task events**: submission and terminal transitions of monitored tasks
//! - **Cancellation events**: accepted and rejected cancel requests
//! - **Job events**: job executions refused before a task was created
//! - **Runtime events**: shutdown progress and subscriber health
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task id and name,
//! reasons and the progress percentage at the time of the event.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use taskmon::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("nightly-backup")
//!     .with_reason("disk full")
//!     .with_percentage(40);
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("nightly-backup"));
//! assert_eq!(ev.reason.as_deref(), Some("disk full"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::monitor::{MonitorState, TaskId, TaskMonitor};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested; every active task was asked to cancel.
    ShutdownRequested,

    /// All tasks stopped within configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some tasks did not stop in time.
    ///
    /// Sets:
    /// - `reason`: comma-separated names of the stuck tasks
    GraceExceeded,

    // === Task events ===
    /// A task was started under a monitor.
    ///
    /// Sets:
    /// - `task_id`, `task`
    TaskSubmitted,

    /// Task finished without error.
    ///
    /// Sets:
    /// - `task_id`, `task`
    /// - `percentage`: frozen progress (always 100)
    TaskSucceeded,

    /// Task ended with an error (or panicked).
    ///
    /// Sets:
    /// - `task_id`, `task`
    /// - `reason`: error message
    /// - `percentage`: last captured progress
    TaskFailed,

    /// Task honored a cancellation request.
    ///
    /// Sets:
    /// - `task_id`, `task`
    TaskCanceled,

    // === Cancellation events ===
    /// A cancel request with a valid token was accepted.
    ///
    /// Sets:
    /// - `task_id`, `task`
    /// - `timeout_ms`: how long the requester waits
    CancelRequested,

    /// A cancel request presented the wrong token.
    ///
    /// Sets:
    /// - `task_id`, `task`
    CancelRejected,

    // === Job events ===
    /// No runner registered for the requested job.
    ///
    /// Sets:
    /// - `task`: job key
    JobUnavailable,

    /// Job prerequisites unmet; nothing was started.
    ///
    /// Sets:
    /// - `task`: job key
    /// - `reason`: why it refused to start
    JobAborted,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Id of the monitored task, if applicable.
    pub task_id: Option<TaskId>,
    /// Name of the task (or job key / subscriber name), if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Progress percentage at the time of the event.
    pub percentage: Option<u8>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task_id: None,
            task: None,
            reason: None,
            percentage: None,
            timeout_ms: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches a progress percentage.
    #[inline]
    pub fn with_percentage(mut self, percentage: u8) -> Self {
        self.percentage = Some(percentage);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// Terminal event for a finished monitor; `None` while it is still running.
    ///
    /// Carries the task id, name and frozen percentage; a failure also carries the
    /// error message as `reason`.
    pub fn finished(monitor: &TaskMonitor) -> Option<Self> {
        let kind = match monitor.state() {
            MonitorState::Running => return None,
            MonitorState::Successful => EventKind::TaskSucceeded,
            MonitorState::Canceled => EventKind::TaskCanceled,
            MonitorState::Failed => EventKind::TaskFailed,
        };
        let ev = Event::new(kind)
            .with_task_id(monitor.id())
            .with_task(monitor.name())
            .with_percentage(monitor.progress().percentage());
        Some(match monitor.failure() {
            Some(err) if kind == EventKind::TaskFailed => ev.with_reason(err.as_message()),
            _ => ev,
        })
    }

    /// Returns `true` if this event reports a dropped delivery.
    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// Returns `true` for the three terminal task events.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TaskSucceeded | EventKind::TaskFailed | EventKind::TaskCanceled
        )
    }
}

//! # Logging subscriber.
//!
//! [`LogWriter`] renders every runtime event as a `tracing` record under the
//! `taskmon::events` target, so it shows up wherever the host application routes its logs.
//!
//! ## Output format (fmt layer)
//! ```text
//! INFO  taskmon::events: submitted task_id=7c1e.. task=backup
//! WARN  taskmon::events: failed task_id=7c1e.. task=backup reason="disk full" percentage=40
//! INFO  taskmon::events: cancel-requested task_id=7c1e.. task=backup timeout_ms=5000
//! WARN  taskmon::events: grace-exceeded reason="backup, reindex"
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that logs events through `tracing`.
///
/// Enabled via the `logging` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task_id = e.task_id.map(|id| id.to_string()).unwrap_or_default();
        let task = e.task.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::TaskSubmitted => {
                info!(target: "taskmon::events", %task_id, task, "submitted");
            }
            EventKind::TaskSucceeded => {
                info!(target: "taskmon::events", %task_id, task, "succeeded");
            }
            EventKind::TaskFailed => {
                warn!(target: "taskmon::events", %task_id, task, reason, percentage = ?e.percentage, "failed");
            }
            EventKind::TaskCanceled => {
                info!(target: "taskmon::events", %task_id, task, "canceled");
            }
            EventKind::CancelRequested => {
                info!(target: "taskmon::events", %task_id, task, timeout_ms = ?e.timeout_ms, "cancel-requested");
            }
            EventKind::CancelRejected => {
                warn!(target: "taskmon::events", %task_id, task, "cancel-rejected");
            }
            EventKind::JobUnavailable => {
                warn!(target: "taskmon::events", job = task, "job-unavailable");
            }
            EventKind::JobAborted => {
                warn!(target: "taskmon::events", job = task, reason, "job-aborted");
            }
            EventKind::ShutdownRequested => {
                info!(target: "taskmon::events", "shutdown-requested");
            }
            EventKind::AllStoppedWithin => {
                info!(target: "taskmon::events", "all-stopped-within-grace");
            }
            EventKind::GraceExceeded => {
                warn!(target: "taskmon::events", reason, "grace-exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "taskmon::events", subscriber = task, reason, "subscriber-overflow");
            }
            EventKind::SubscriberPanicked => {
                warn!(target: "taskmon::events", subscriber = task, reason, "subscriber-panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}

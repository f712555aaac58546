//! # Run outcome and run record.
//!
//! A [`RunRecord`] is the durable summary of one job execution: when it started, how long
//! it took, how it ended and a short human-readable message.
//!
//! ## Mapping from monitor state
//! ```text
//! Successful ─► Success   (message: last progress message)
//! Failed     ─► Failed    (message: error text)
//! Canceled   ─► Aborted   (message: "canceled")
//! ```
//! `Unavailable` and pre-start `Aborted` records come from the driver and never have a
//! monitor behind them.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::{MonitorState, TaskMonitor};

/// Maximum stored message length, in characters.
pub const MAX_MESSAGE_CHARS: usize = 255;

/// How a job execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    /// The task completed normally.
    Success,
    /// The job could not run at all (no runner for it).
    Unavailable,
    /// Prerequisites were unmet, or the task was canceled.
    Aborted,
    /// The task raised an error.
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunOutcome::Success => "success",
            RunOutcome::Unavailable => "unavailable",
            RunOutcome::Aborted => "aborted",
            RunOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Summary of one job execution.
///
/// Deserialization goes through the same truncation as [`RunRecord::new`], so records read
/// back from a store never exceed [`MAX_MESSAGE_CHARS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawRunRecord")]
pub struct RunRecord {
    started_at: DateTime<Utc>,
    duration_ms: u64,
    outcome: RunOutcome,
    message: String,
}

/// Wire form accepted on deserialization.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRunRecord {
    started_at: DateTime<Utc>,
    duration_ms: u64,
    outcome: RunOutcome,
    message: String,
}

impl From<RawRunRecord> for RunRecord {
    fn from(raw: RawRunRecord) -> Self {
        Self {
            started_at: raw.started_at,
            duration_ms: raw.duration_ms,
            outcome: raw.outcome,
            message: truncate(raw.message),
        }
    }
}

impl RunRecord {
    /// Builds a record; `message` is truncated to [`MAX_MESSAGE_CHARS`] characters.
    pub fn new(
        started_at: DateTime<Utc>,
        duration: Duration,
        outcome: RunOutcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            started_at,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            outcome,
            message: truncate(message.into()),
        }
    }

    /// Record for a job with no registered runner.
    pub fn unavailable(job: &str) -> Self {
        Self::new(
            Utc::now(),
            Duration::ZERO,
            RunOutcome::Unavailable,
            format!("no runner registered for job '{job}'"),
        )
    }

    /// Record for a job whose prerequisites were not met.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::new(Utc::now(), Duration::ZERO, RunOutcome::Aborted, reason)
    }

    /// Record describing a finished monitor; `None` while it is still running.
    pub fn from_monitor(monitor: &TaskMonitor) -> Option<Self> {
        let (outcome, message) = match monitor.state() {
            MonitorState::Running => return None,
            MonitorState::Successful => {
                (RunOutcome::Success, monitor.progress().message().to_string())
            }
            MonitorState::Canceled => (RunOutcome::Aborted, "canceled".to_string()),
            MonitorState::Failed => (
                RunOutcome::Failed,
                monitor
                    .failure()
                    .map(|e| e.as_message())
                    .unwrap_or_else(|| "failed".to_string()),
            ),
        };
        Some(Self::new(
            monitor.started_at(),
            monitor.elapsed(),
            outcome,
            message,
        ))
    }

    /// Wall-clock start.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Run time in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// How the run ended.
    pub fn outcome(&self) -> RunOutcome {
        self.outcome
    }

    /// Short description, at most [`MAX_MESSAGE_CHARS`] characters.
    pub fn message(&self) -> &str {
        &self.message
    }
}

fn truncate(mut message: String) -> String {
    if let Some((idx, _)) = message.char_indices().nth(MAX_MESSAGE_CHARS) {
        message.truncate(idx);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_messages_are_truncated_on_char_boundary() {
        let msg = "é".repeat(300);
        let rec = RunRecord::new(Utc::now(), Duration::from_millis(5), RunOutcome::Failed, msg);
        assert_eq!(rec.message().chars().count(), MAX_MESSAGE_CHARS);
        assert!(rec.message().chars().all(|c| c == 'é'));
    }

    #[test]
    fn short_messages_are_kept() {
        let rec = RunRecord::new(Utc::now(), Duration::ZERO, RunOutcome::Success, "ok");
        assert_eq!(rec.message(), "ok");
        assert_eq!(rec.duration_ms(), 0);
    }

    #[test]
    fn driver_records() {
        let rec = RunRecord::unavailable("reindex");
        assert_eq!(rec.outcome(), RunOutcome::Unavailable);
        assert!(rec.message().contains("reindex"));

        let rec = RunRecord::aborted("cluster lock held by node-2");
        assert_eq!(rec.outcome(), RunOutcome::Aborted);
        assert_eq!(rec.duration_ms(), 0);
    }

    #[test]
    fn serde_uses_wire_names() {
        let rec = RunRecord::new(Utc::now(), Duration::from_millis(1500), RunOutcome::Aborted, "x");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["outcome"], "ABORTED");
        assert_eq!(json["durationMs"], 1500);
        let back: RunRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn deserialized_messages_are_truncated() {
        let json = serde_json::json!({
            "startedAt": "2026-10-16T08:00:00Z",
            "durationMs": 1,
            "outcome": "FAILED",
            "message": "x".repeat(300),
        });
        let rec: RunRecord = serde_json::from_value(json).unwrap();
        assert_eq!(rec.message().chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(rec.outcome(), RunOutcome::Failed);
        assert_eq!(rec.duration_ms(), 1);
    }
}

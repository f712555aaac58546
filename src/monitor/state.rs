use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`TaskMonitor`](crate::TaskMonitor).
///
/// ```text
/// Running -> Successful | Failed | Canceled   (terminal, written once)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorState {
    /// The worker is still executing the task.
    Running,
    /// `run()` returned without error.
    Successful,
    /// `run()` returned an error without the cancellation marker, or panicked.
    Failed,
    /// `run()` returned an error carrying the cancellation marker.
    Canceled,
}

impl MonitorState {
    /// Returns `true` for `Successful`, `Failed` and `Canceled`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MonitorState::Running)
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::Running => write!(f, "running"),
            MonitorState::Successful => write!(f, "successful"),
            MonitorState::Failed => write!(f, "failed"),
            MonitorState::Canceled => write!(f, "canceled"),
        }
    }
}

//! # Cancellation flag and progress publisher for leaf tasks.
//!
//! [`TaskControl`] is the state a leaf task shares with its observers:
//! - a [`CancellationToken`] used as the cooperative cancel flag;
//! - a `watch` channel holding the latest [`Progress`] (single writer, many readers).
//!
//! Readers always see a whole snapshot; a new value is published by replacing the
//! previous one, never by mutating it.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, TaskError};
use crate::progress::Progress;

/// Cancellation flag + latest progress, cheap to clone.
///
/// ## Example
/// ```
/// use taskmon::{Progress, TaskControl};
///
/// let ctl = TaskControl::new(Progress::initial("Unzipping"));
/// ctl.report("Unzipping", 30).unwrap();
/// assert_eq!(ctl.progress().percentage(), 30);
///
/// assert!(ctl.checkpoint().is_ok());
/// ctl.cancel();
/// assert!(ctl.checkpoint().unwrap_err().is_cancellation());
/// ```
#[derive(Clone, Debug)]
pub struct TaskControl {
    cancel: CancellationToken,
    progress: Arc<watch::Sender<Progress>>,
}

impl TaskControl {
    /// Creates a control with the given starting snapshot.
    pub fn new(initial: Progress) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            cancel: CancellationToken::new(),
            progress: Arc::new(tx),
        }
    }

    /// Latest published snapshot.
    pub fn progress(&self) -> Progress {
        self.progress.borrow().clone()
    }

    /// Publishes a new snapshot.
    pub fn publish(&self, progress: Progress) {
        self.progress.send_replace(progress);
    }

    /// Validates and publishes a new snapshot.
    pub fn report(&self, message: impl Into<String>, percentage: i64) -> Result<(), RuntimeError> {
        self.publish(Progress::new(message, percentage)?);
        Ok(())
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Sets the cancel flag.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once [`TaskControl::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Checkpoint: returns [`TaskError::Canceled`] if cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        if self.cancel.is_cancelled() {
            Err(TaskError::Canceled {
                reason: format!("stopped at '{}'", self.progress.borrow().message()),
            })
        } else {
            Ok(())
        }
    }

    /// Completes when cancellation is requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// The underlying flag, for code that already speaks [`CancellationToken`].
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Default for TaskControl {
    fn default() -> Self {
        Self::new(Progress::default())
    }
}

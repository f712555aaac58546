//! # Task abstraction.
//!
//! This module defines the [`Task`] trait: a named, progress-reporting, cooperatively
//! cancellable unit of async work. The common handle type is [`TaskRef`], an
//! `Arc<dyn Task>` suitable for sharing between the worker and observers.
//!
//! ## Cancellation contract
//! [`Task::cancel`] only *requests* cancellation: it sets a flag and returns. The task
//! checks that flag at checkpoints it chooses and, when it honors the request, returns
//! [`TaskError::Canceled`]. A task that never reaches a checkpoint after the request
//! may still finish successfully; cancellation is best-effort, never preemptive.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::progress::Progress;

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancellable, progress-reporting unit.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use taskmon::{Progress, Task, TaskControl, TaskError};
///
/// struct Backup {
///     control: TaskControl,
/// }
///
/// #[async_trait]
/// impl Task for Backup {
///     fn name(&self) -> &str { "backup" }
///
///     fn progress(&self) -> Progress { self.control.progress() }
///
///     fn cancel(&self) { self.control.cancel() }
///
///     async fn run(&self) -> Result<(), TaskError> {
///         for table in 0..10 {
///             self.control.checkpoint()?;
///             // dump table...
///             self.control.report(format!("Dumped table {table}"), (table + 1) * 10).ok();
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    ///
    /// Defaults to the implementing type's name without its module path.
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    /// Returns the most recent progress snapshot.
    ///
    /// Must never block and never fail.
    fn progress(&self) -> Progress;

    /// Requests cancellation.
    ///
    /// Idempotent and non-blocking; only sets a flag observed by [`Task::run`].
    fn cancel(&self);

    /// Performs the work.
    ///
    /// Implementations check their cancellation flag at safe checkpoints and return
    /// [`TaskError::Canceled`] when they stop because of it.
    async fn run(&self) -> Result<(), TaskError>;
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

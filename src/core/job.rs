//! # Job runners.
//!
//! A [`Job`] is a named kind of work (backup, restore, reindex, ...) that the supervisor
//! can start on demand. Each execution gets a **fresh** task from [`Job::create`]; task
//! instances are never reused.
//!
//! ```text
//! run_job(key)
//!   ├─ no Job registered for key ─► RunOutcome::Unavailable (recorded, nothing started)
//!   ├─ job.check() = Err(reason)  ─► RunOutcome::Aborted     (recorded, nothing started)
//!   └─ job.create()               ─► TaskMonitor::spawn(...)
//! ```

use crate::tasks::TaskRef;

/// Factory for one kind of job.
///
/// ## Example
/// ```rust
/// use taskmon::{Job, TaskControl, TaskFn, TaskRef};
///
/// struct Reindex;
///
/// impl Job for Reindex {
///     fn key(&self) -> &str { "reindex" }
///
///     fn create(&self) -> TaskRef {
///         TaskFn::arc("reindex", |ctl: TaskControl| async move {
///             ctl.report("Rebuilding search index", 0).ok();
///             ctl.checkpoint()
///         })
///     }
/// }
/// ```
pub trait Job: Send + Sync + 'static {
    /// Stable key identifying this job kind.
    fn key(&self) -> &str;

    /// Prerequisite check run before every execution.
    ///
    /// Return `Err(reason)` to refuse to start (e.g. maintenance lock held elsewhere).
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    /// Creates a fresh task for one execution.
    fn create(&self) -> TaskRef;
}

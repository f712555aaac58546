//! # taskmon
//!
//! **taskmon** runs long-running maintenance work (backups, restores, reindexing,
//! migrations) as cancellable tasks that report one canonical progress value, and
//! tracks every execution with a monitor that answers "how far along is it?",
//! "did it finish?", and "stop it, please".
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────────────────────────────────┐
//!     │  Task (leaf) │   │ Pipeline (composite)                     │
//!     │  TaskFn +    │   │  step 1 (w=30) ─► step 2 (w=70) ─► ...   │
//!     │  TaskControl │   │  progress = weighted aggregate           │
//!     └──────┬───────┘   └────────────────────┬─────────────────────┘
//!            └──────────────┬─────────────────┘
//!                           ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (driver)                                              │
//! │  - Registry (monitors by id, one run per job, bounded retention)  │
//! │  - Jobs (fresh task per execution, prerequisite check)            │
//! │  - RunHistory (one RunRecord per execution)                       │
//! │  - Bus + SubscriberSet (event fan-out)                            │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ TaskMonitor  │   │ TaskMonitor  │   │ TaskMonitor  │
//!     │ (worker)     │   │ (worker)     │   │ (worker)     │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ observers: progress(), state(), await_completion(),
//!      │            cancel(token, timeout), register_callback()
//!      ▼
//!   terminal transition (once) ─► callbacks (once) ─► waiters woken
//! ```
//!
//! ### Lifecycle
//! ```text
//! TaskMonitor::spawn(task) ──► Running
//!                                 │ worker: task.run().await
//!                                 ├─ Ok(())                      ─► Successful (progress frozen at 100%)
//!                                 ├─ Err(TaskError::Canceled)    ─► Canceled   (progress frozen at 100%)
//!                                 └─ Err(other) / panic          ─► Failed     (last progress kept)
//! ```
//!
//! Cancellation is cooperative: `cancel()` only sets a flag. A task that finishes
//! successfully or fails after the request is reported as such; only a task that
//! detected the request and returned the cancellation marker ends `Canceled`.
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------------|---------------------------------------------|
//! | **Tasks**         | Cancellable work with progress, leaf helpers and weighted pipelines.| [`Task`], [`TaskFn`], [`TaskControl`], [`Pipeline`] |
//! | **Progress**      | Immutable, validated `(message, percentage)` snapshots.            | [`Progress`]                                |
//! | **Monitoring**    | Lifecycle, cancel with token, completion callbacks, waiting.       | [`TaskMonitor`], [`MonitorCallback`]        |
//! | **Records**       | One summary per execution handed to a history collaborator.        | [`RunRecord`], [`RunHistory`]               |
//! | **Supervision**   | Submit tasks, run jobs, route cancels, graceful shutdown.          | [`Supervisor`], [`Job`]                     |
//! | **Subscriber API**| Hook into runtime events (logging, notifications, audit).          | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for the engine and for task execution.                | [`RuntimeError`], [`TaskError`]             |
//! | **Configuration** | Centralize runtime settings.                                       | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber (logs events via `tracing`).
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskmon::{
//!     Config, MonitorState, Pipeline, SessionContext, Supervisor, TaskControl, TaskFn,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::builder(Config::default()).build();
//!
//!     let dump = TaskFn::arc("dump", |ctl: TaskControl| async move {
//!         for pct in (0..=100).step_by(25) {
//!             ctl.checkpoint()?;
//!             ctl.report("Dumping tables", pct)?;
//!             tokio::time::sleep(Duration::from_millis(1)).await;
//!         }
//!         Ok(())
//!     });
//!     let upload = TaskFn::arc("upload", |ctl: TaskControl| async move {
//!         ctl.checkpoint()?;
//!         ctl.report("Uploading archive", 100)?;
//!         Ok(())
//!     });
//!
//!     let backup = Pipeline::builder("backup")
//!         .step(dump, 30)
//!         .step(upload, 70)
//!         .build()?;
//!
//!     let run = sup.submit(std::sync::Arc::new(backup), &SessionContext::new("ops"));
//!     assert_eq!(run.monitor.await_completion().await, MonitorState::Successful);
//!     assert_eq!(run.monitor.progress().percentage(), 100);
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod monitor;
mod progress;
mod record;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{Config, Job, Registry, Submission, Supervisor, SupervisorBuilder};
pub use error::{BoxError, ErrorKind, RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use monitor::{
    CancelToken, MonitorCallback, MonitorSnapshot, MonitorState, Origin, RequestContext,
    SessionContext, TaskId, TaskMonitor,
};
pub use progress::Progress;
pub use record::{InMemoryHistory, MAX_MESSAGE_CHARS, RunHistory, RunOutcome, RunRecord};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{Pipeline, PipelineBuilder, Step, Task, TaskControl, TaskFn, TaskRef};

// Optional: expose a built-in logging subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

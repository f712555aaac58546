//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(TaskControl) -> Fut` and a [`TaskControl`].
//! The closure receives a clone of the control, so it can report progress and check
//! its cancel flag while observers read the same state through the [`Task`] methods.
//!
//! A `TaskFn` is meant to be created for a single execution, like every task.
//!
//! ## Example
//! ```rust
//! use taskmon::{TaskControl, TaskError, TaskFn, TaskRef};
//!
//! let t: TaskRef = TaskFn::arc("unzip", |ctl: TaskControl| async move {
//!     for entry in 0..4 {
//!         ctl.checkpoint()?;
//!         ctl.report(format!("Extracting entry {entry}"), (entry + 1) * 25).ok();
//!     }
//!     Ok::<_, TaskError>(())
//! });
//!
//! assert_eq!(t.name(), "unzip");
//! assert_eq!(t.progress().percentage(), 0);
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::progress::Progress;
use crate::tasks::control::TaskControl;
use crate::tasks::task::Task;

/// Function-backed task implementation.
#[derive(Debug)]
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    control: TaskControl,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task starting at `0%` with an empty message.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`](crate::TaskRef).
    pub fn new<Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(TaskControl) -> Fut,
        Fut: Future<Output = Result<(), TaskError>>,
    {
        Self::with_control(name, TaskControl::default(), f)
    }

    /// Creates a task around an existing control.
    ///
    /// Useful when the caller wants to keep a handle on the control, e.g. to mirror
    /// the progress of a backing job that is already in flight.
    pub fn with_control<Fut>(name: impl Into<Cow<'static, str>>, control: TaskControl, f: F) -> Self
    where
        F: Fn(TaskControl) -> Fut,
        Fut: Future<Output = Result<(), TaskError>>,
    {
        Self {
            name: name.into(),
            control,
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc<Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self>
    where
        F: Fn(TaskControl) -> Fut,
        Fut: Future<Output = Result<(), TaskError>>,
    {
        Arc::new(Self::new(name, f))
    }

    /// The control shared with the closure.
    pub fn control(&self) -> &TaskControl {
        &self.control
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn(TaskControl) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn progress(&self) -> Progress {
        self.control.progress()
    }

    fn cancel(&self) {
        self.control.cancel();
    }

    async fn run(&self) -> Result<(), TaskError> {
        (self.f)(self.control.clone()).await
    }
}

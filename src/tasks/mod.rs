//! # Task abstractions.
//!
//! This module provides the core task-related types:
//! - [`Task`] - trait for async, cancellable, progress-reporting work
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskControl`] - cancel flag + progress publisher for leaf tasks
//! - [`TaskFn`] - function-backed leaf task
//! - [`Pipeline`] - composite task running weighted steps in sequence

mod control;
mod pipeline;
mod task;
mod task_fn;

pub use control::TaskControl;
pub use pipeline::{Pipeline, PipelineBuilder, Step};
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;

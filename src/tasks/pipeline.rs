//! # Weighted pipeline: a composite task.
//!
//! [`Pipeline`] runs an ordered list of `(task, weight)` steps one after another and
//! exposes them as a single [`Task`]. Because a pipeline is itself a task, pipelines nest.
//!
//! ## Progress aggregation
//! ```text
//! cur = index of the running step (last step once finished)
//!
//! contribution(i) = weight(i) × 100                          if i < cur
//!                 = weight(i) × step(i).progress().percentage if i >= cur
//!
//! percentage = ceil(Σ contribution / total_weight)     (integer arithmetic)
//! message    = step(cur).progress().message
//! ```
//! Steps after `cur` still contribute their own percentage, so a step that mirrors a
//! backing job already in flight does not make the aggregate jump backwards when the
//! pipeline reaches it.
//!
//! ## Cancellation
//! ```text
//! cancel()
//!   ├─► set own flag          (checked before every step starts)
//!   └─► forward cancel() to the running step and every pending step
//!       (finished steps are left alone; once the pipeline returned, nothing is forwarded)
//! ```
//! A started step is never aborted; it stops only if it reaches one of its own checkpoints.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RuntimeError, TaskError};
use crate::progress::Progress;
use crate::tasks::task::{Task, TaskRef};

/// One weighted step of a [`Pipeline`].
#[derive(Clone)]
pub struct Step {
    task: TaskRef,
    weight: u32,
}

impl Step {
    /// The step's task.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// The step's weight.
    pub fn weight(&self) -> u32 {
        self.weight
    }
}

/// Builder for [`Pipeline`].
///
/// ## Example
/// ```rust
/// use taskmon::{Pipeline, TaskControl, TaskFn};
///
/// let restore = Pipeline::builder("restore")
///     .step(TaskFn::arc("unzip", |_ctl: TaskControl| async { Ok(()) }), 30)
///     .step(TaskFn::arc("import", |_ctl: TaskControl| async { Ok(()) }), 70)
///     .build()
///     .unwrap();
///
/// assert_eq!(restore.total_weight(), 100);
/// assert_eq!(restore.steps().len(), 2);
///
/// assert!(Pipeline::builder("empty").build().is_err());
/// ```
pub struct PipelineBuilder {
    name: Cow<'static, str>,
    steps: Vec<Step>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Appends a step. Steps run in insertion order.
    pub fn step(mut self, task: TaskRef, weight: u32) -> Self {
        self.steps.push(Step { task, weight });
        self
    }

    /// Builds the pipeline; fails with [`RuntimeError::EmptyPipeline`] if no step was added.
    pub fn build(self) -> Result<Pipeline, RuntimeError> {
        if self.steps.is_empty() {
            return Err(RuntimeError::EmptyPipeline {
                pipeline: self.name.into_owned(),
            });
        }
        let total_weight = self.steps.iter().map(|s| u64::from(s.weight)).sum();
        Ok(Pipeline {
            name: self.name,
            steps: self.steps,
            total_weight,
            completed: AtomicUsize::new(0),
            settled: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        })
    }
}

/// Composite task running weighted steps in sequence.
pub struct Pipeline {
    name: Cow<'static, str>,
    steps: Vec<Step>,
    total_weight: u64,
    /// Number of steps that ran to completion; also the index of the running step.
    completed: AtomicUsize,
    /// Steps below this index never receive `cancel()`; equals `steps.len()` once the
    /// pipeline returned, whatever the outcome.
    settled: AtomicUsize,
    cancelled: AtomicBool,
}

impl Pipeline {
    /// Starts a [`PipelineBuilder`].
    pub fn builder(name: impl Into<Cow<'static, str>>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// The steps in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Sum of all step weights.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Index of the running step, or of the last step once the pipeline is done.
    pub fn current_step(&self) -> usize {
        self.completed
            .load(Ordering::Acquire)
            .min(self.steps.len() - 1)
    }
}

#[async_trait]
impl Task for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn progress(&self) -> Progress {
        let cur = self.current_step();
        let current = self.steps[cur].task.progress();

        let percentage = if self.total_weight == 0 {
            current.percentage()
        } else {
            let units: u64 = self
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| {
                    let pct = if i < cur {
                        100
                    } else if i == cur {
                        u64::from(current.percentage())
                    } else {
                        u64::from(step.task.progress().percentage())
                    };
                    u64::from(step.weight) * pct.min(100)
                })
                .sum();
            units.div_ceil(self.total_weight).min(100) as u8
        };

        Progress::clamped(current.message(), percentage)
    }

    fn cancel(&self) {
        // SeqCst pairs with `run`: either this load sees the step settled, or `run`
        // sees the flag before it starts another step.
        self.cancelled.store(true, Ordering::SeqCst);
        let from = self.settled.load(Ordering::SeqCst);
        for step in self.steps.iter().skip(from) {
            step.task.cancel();
        }
    }

    async fn run(&self) -> Result<(), TaskError> {
        let last = self.steps.len() - 1;
        for (i, step) in self.steps.iter().enumerate() {
            if self.cancelled.load(Ordering::SeqCst) {
                debug!(pipeline = %self.name, step = i, "pipeline cancelled before step");
                self.settled.store(self.steps.len(), Ordering::SeqCst);
                return Err(TaskError::Canceled {
                    reason: format!(
                        "pipeline '{}' stopped before step '{}'",
                        self.name,
                        step.task.name()
                    ),
                });
            }

            debug!(pipeline = %self.name, step = i, task = step.task.name(), "step starting");
            if let Err(err) = step.task.run().await {
                debug!(pipeline = %self.name, step = i, label = err.as_label(), "step ended with error");
                self.settled.store(self.steps.len(), Ordering::SeqCst);
                return Err(err);
            }

            if i == last {
                self.settled.store(self.steps.len(), Ordering::SeqCst);
            } else {
                self.completed.store(i + 1, Ordering::Release);
                self.settled.store(i + 1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

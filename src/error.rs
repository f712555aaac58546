//! Error types used by the taskmon runtime and tasks.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`]: errors raised by the engine itself (validation, authorization, lookup).
//! - [`TaskError`]: errors raised by individual task executions.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! [`RuntimeError::kind`] groups runtime errors into the coarse [`ErrorKind`] taxonomy
//! callers usually branch on.

use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Boxed cause carried by [`TaskError::Fail`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Coarse classification of [`RuntimeError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A value was rejected at construction time.
    InvalidArgument,
    /// An operation was attempted on an object in the wrong state.
    InvalidState,
    /// The caller presented a credential that does not match.
    Unauthorized,
    /// The referenced task does not exist (or is no longer tracked).
    NotFound,
    /// The requested job cannot run (no runner, prerequisites unmet, already running).
    Unavailable,
    /// A bounded wait elapsed.
    Timeout,
}

/// # Errors produced by the taskmon runtime.
///
/// Construction-time validation errors are returned immediately and never coerced.
/// A mismatching cancellation token always surfaces as [`RuntimeError::IncorrectToken`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Progress percentage outside `0..=100`.
    #[error("progress percentage {percentage} outside 0..=100")]
    InvalidPercentage {
        /// The rejected value.
        percentage: i64,
    },

    /// A pipeline was built without any steps.
    #[error("pipeline '{pipeline}' has no steps")]
    EmptyPipeline {
        /// Name of the pipeline being built.
        pipeline: String,
    },

    /// Cancellation was requested with a token that does not belong to the task.
    #[error("incorrect cancellation token for task {task_id}")]
    IncorrectToken {
        /// The task the caller tried to cancel.
        task_id: String,
    },

    /// No task with the given id is tracked.
    #[error("task not found: {task_id}")]
    NotFound {
        /// The missing task id.
        task_id: String,
    },

    /// No runner is registered for the job key.
    #[error("no runner registered for job '{job}'")]
    JobUnavailable {
        /// The requested job key.
        job: String,
    },

    /// The job's prerequisites were not met; it never started.
    #[error("job '{job}' aborted: {reason}")]
    JobAborted {
        /// The requested job key.
        job: String,
        /// Why the job refused to start.
        reason: String,
    },

    /// A run of the same job is still in flight.
    #[error("job '{job}' is already running as task {task_id}")]
    JobAlreadyRunning {
        /// The requested job key.
        job: String,
        /// The in-flight task.
        task_id: String,
    },

    /// Shutdown grace period was exceeded; some tasks ignored cancellation.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the tasks still running.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::InvalidPercentage { .. } => ErrorKind::InvalidArgument,
            RuntimeError::EmptyPipeline { .. } => ErrorKind::InvalidState,
            RuntimeError::IncorrectToken { .. } => ErrorKind::Unauthorized,
            RuntimeError::NotFound { .. } => ErrorKind::NotFound,
            RuntimeError::JobUnavailable { .. }
            | RuntimeError::JobAborted { .. }
            | RuntimeError::JobAlreadyRunning { .. } => ErrorKind::Unavailable,
            RuntimeError::GraceExceeded { .. } => ErrorKind::Timeout,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskmon::RuntimeError;
    ///
    /// let err = RuntimeError::IncorrectToken { task_id: "t-1".into() };
    /// assert_eq!(err.as_label(), "runtime_incorrect_token");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidPercentage { .. } => "runtime_invalid_percentage",
            RuntimeError::EmptyPipeline { .. } => "runtime_empty_pipeline",
            RuntimeError::IncorrectToken { .. } => "runtime_incorrect_token",
            RuntimeError::NotFound { .. } => "runtime_not_found",
            RuntimeError::JobUnavailable { .. } => "runtime_job_unavailable",
            RuntimeError::JobAborted { .. } => "runtime_job_aborted",
            RuntimeError::JobAlreadyRunning { .. } => "runtime_job_already_running",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck tasks={stuck:?}")
            }
            other => other.to_string(),
        }
    }
}

/// # Errors produced by task execution.
///
/// [`TaskError::Canceled`] is the cancellation-detection marker: a task returns it
/// when it observed its own cancellation flag at a checkpoint and stopped. Any other
/// variant is a genuine failure.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
        /// The original error, when the failure wraps one.
        #[source]
        source: Option<BoxError>,
    },

    /// Task detected a cancellation request and stopped.
    #[error("canceled: {reason}")]
    Canceled {
        /// What the task was doing (or the error it was about to raise) when it stopped.
        reason: String,
    },

    /// Task panicked while running.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

/// Lets task bodies use `?` on engine calls such as [`TaskControl::report`](crate::TaskControl::report).
impl From<RuntimeError> for TaskError {
    fn from(err: RuntimeError) -> Self {
        TaskError::caused_by(err)
    }
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
            source: None,
        }
    }

    /// Wraps an underlying error; it stays reachable through [`StdError::source`].
    ///
    /// # Example
    /// ```
    /// use std::error::Error;
    /// use taskmon::TaskError;
    ///
    /// let io = std::io::Error::new(std::io::ErrorKind::NotFound, "dump.sql.gz missing");
    /// let err = TaskError::caused_by(io);
    /// assert!(err.to_string().contains("dump.sql.gz missing"));
    /// assert!(err.source().unwrap().downcast_ref::<std::io::Error>().is_some());
    /// ```
    pub fn caused_by(err: impl StdError + Send + Sync + 'static) -> Self {
        TaskError::Fail {
            error: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Messages of the wrapped causes, outermost first (empty when there is none).
    pub fn causes(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut next = self.source();
        while let Some(cause) = next {
            out.push(cause.to_string());
            next = cause.source();
        }
        out
    }

    /// Shorthand for [`TaskError::Canceled`] with a generic reason.
    pub fn canceled() -> Self {
        TaskError::Canceled {
            reason: "cancellation requested".to_string(),
        }
    }

    /// Tags this error with the cancellation marker, keeping its message as the reason.
    ///
    /// Use it when a step fails *because* it noticed the cancel flag (for example a
    /// closed channel after the flag was set).
    ///
    /// # Example
    /// ```
    /// use taskmon::TaskError;
    ///
    /// let err = TaskError::fail("index writer closed").into_canceled();
    /// assert!(err.is_cancellation());
    /// assert!(err.to_string().contains("index writer closed"));
    /// ```
    pub fn into_canceled(self) -> Self {
        match self {
            TaskError::Canceled { .. } => self,
            TaskError::Fail { error, .. } => TaskError::Canceled { reason: error },
            TaskError::Panicked { info } => TaskError::Canceled { reason: info },
        }
    }

    /// Returns `true` if the error carries the cancellation marker.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Canceled { .. })
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskmon::TaskError;
    ///
    /// assert_eq!(TaskError::canceled().as_label(), "task_canceled");
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled { .. } => "task_canceled",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error, .. } => format!("error: {error}"),
            TaskError::Canceled { reason } => format!("canceled: {reason}"),
            TaskError::Panicked { info } => format!("panic: {info}"),
        }
    }
}

//! # Supervisor: starts monitored tasks, runs jobs, and shuts down gracefully.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`], the monitor [`Registry`],
//! the run history and the registered [`Job`]s. It is the driver side of the engine:
//! callers hand it tasks (or job keys) and get back a monitor plus the cancel token.
//!
//! ## Key responsibilities
//! - start every task under a [`TaskMonitor`] and register it by id
//! - refuse jobs with no runner (`Unavailable`) or unmet prerequisites (`Aborted`)
//! - on each terminal transition: record a [`RunRecord`], publish an event, retire the
//!   monitor
//! - route cancel requests by id, checking the token
//! - on shutdown, cancel everything and wait up to [`Config::grace`]
//!
//! ## High-level architecture
//! ```text
//! submit(task, ctx) / run_job(key, ctx)
//!     │
//!     ├─ run_job only: lookup Job ─► none        ─► history(Unavailable), JobUnavailable
//!     │                └─► check() = Err(reason) ─► history(Aborted),     JobAborted
//!     │
//!     └─► TaskMonitor::spawn(task, origin) ─► Registry::insert / insert_job
//!            ├─► Bus.publish(TaskSubmitted)
//!            └─► monitor.register_callback(Retire)
//!                       │ (exactly once, at the terminal transition)
//!                       ├─► history.record(job, RunRecord::from_monitor)
//!                       ├─► Bus.publish(TaskSucceeded | TaskFailed | TaskCanceled)
//!                       └─► Registry::retire(id)
//!
//! Bus ──► listener (spawned by the builder) ──► SubscriberSet::dispatch(Event)
//!
//! shutdown():
//!   Bus.publish(ShutdownRequested)
//!   for each active monitor: monitor.cancel(token, grace)   (concurrently)
//!      ├─ all stopped ─► Bus.publish(AllStoppedWithin)
//!      └─ some running ─► Bus.publish(GraceExceeded) + RuntimeError::GraceExceeded{stuck}
//! ```
//!
//! Because monitor callbacks run before waiters are woken, once
//! [`TaskMonitor::await_completion`] returns the run record is already in the history.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use taskmon::{
//!     Config, InMemoryHistory, MonitorState, RunOutcome, SessionContext, Supervisor,
//!     TaskControl, TaskFn,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let history = Arc::new(InMemoryHistory::new(32));
//!     let sup = Supervisor::builder(Config::default())
//!         .with_history(history.clone())
//!         .build();
//!
//!     let task = TaskFn::arc("export", |ctl: TaskControl| async move {
//!         ctl.report("Exporting users", 50)?;
//!         Ok(())
//!     });
//!     let run = sup.submit(task, &SessionContext::new("admin-session"));
//!
//!     assert_eq!(run.monitor.await_completion().await, MonitorState::Successful);
//!     assert_eq!(history.last("export").unwrap().outcome(), RunOutcome::Success);
//!
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{builder::SupervisorBuilder, config::Config, job::Job, registry::Registry};
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::monitor::{CancelToken, MonitorCallback, Origin, RequestContext, TaskId, TaskMonitor};
use crate::record::{RunHistory, RunRecord};
use crate::subscribers::SubscriberSet;
use crate::tasks::TaskRef;

/// A started task: the monitor everyone may observe plus the token only the
/// requester should keep.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Observer handle.
    pub monitor: TaskMonitor,
    /// Credential for [`Supervisor::cancel`] / [`TaskMonitor::cancel`].
    pub token: CancelToken,
}

/// Driver for monitored tasks and jobs.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    registry: Arc<Registry>,
    history: Arc<dyn RunHistory>,
    jobs: HashMap<String, Arc<dyn Job>>,
    runtime_token: CancellationToken,
}

impl Supervisor {
    /// Creates a builder with the given configuration.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        history: Arc<dyn RunHistory>,
        jobs: HashMap<String, Arc<dyn Job>>,
        runtime_token: CancellationToken,
    ) -> Self {
        let registry = Arc::new(Registry::new(cfg.retired_capacity));
        Self {
            cfg,
            bus,
            subs,
            registry,
            history,
            jobs,
            runtime_token,
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus; subscribe to observe events directly.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Monitor registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run history collaborator.
    pub fn history(&self) -> &Arc<dyn RunHistory> {
        &self.history
    }

    /// Number of event subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subs.len()
    }

    /// Sorted keys of the registered jobs.
    pub fn jobs(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.jobs.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Starts `task` under a new monitor owned by `ctx`'s session.
    ///
    /// Run records for submitted tasks are keyed by the task name.
    pub fn submit(&self, task: TaskRef, ctx: &dyn RequestContext) -> Submission {
        let key: Arc<str> = Arc::from(task.name());
        let (monitor, token) = TaskMonitor::spawn(task, self.origin(ctx));
        self.registry.insert(&monitor, &token);
        self.watch(key, monitor, token)
    }

    /// Starts a fresh execution of the job registered under `key`.
    ///
    /// # Errors
    /// - [`RuntimeError::JobUnavailable`]: no runner for `key` (recorded as `Unavailable`)
    /// - [`RuntimeError::JobAborted`]: prerequisites unmet (recorded as `Aborted`)
    /// - [`RuntimeError::JobAlreadyRunning`]: a previous execution is still in flight
    ///   (nothing recorded)
    pub fn run_job(&self, key: &str, ctx: &dyn RequestContext) -> Result<Submission, RuntimeError> {
        let Some(job) = self.jobs.get(key) else {
            warn!(job = key, "no runner registered");
            self.history.record(key, RunRecord::unavailable(key));
            self.bus.publish(Event::new(EventKind::JobUnavailable).with_task(key));
            return Err(RuntimeError::JobUnavailable {
                job: key.to_string(),
            });
        };

        if let Err(reason) = job.check() {
            warn!(job = key, %reason, "job prerequisites not met");
            self.history.record(key, RunRecord::aborted(reason.as_str()));
            self.bus.publish(
                Event::new(EventKind::JobAborted)
                    .with_task(key)
                    .with_reason(reason.as_str()),
            );
            return Err(RuntimeError::JobAborted {
                job: key.to_string(),
                reason,
            });
        }

        let origin = self.origin(ctx);
        let (monitor, token) = self
            .registry
            .insert_job(key, || TaskMonitor::spawn(job.create(), origin))
            .inspect_err(|e| debug!(job = key, error = %e, "job rejected"))?;
        Ok(self.watch(Arc::from(key), monitor, token))
    }

    fn origin(&self, ctx: &dyn RequestContext) -> Origin {
        Origin::new(Arc::clone(&self.cfg.node_id), ctx)
    }

    /// Announces a registered monitor and hooks the retire callback onto it.
    fn watch(&self, key: Arc<str>, monitor: TaskMonitor, token: CancelToken) -> Submission {
        self.bus.publish(
            Event::new(EventKind::TaskSubmitted)
                .with_task_id(monitor.id())
                .with_task(monitor.name()),
        );
        monitor.register_callback(Arc::new(Retire {
            key,
            registry: Arc::downgrade(&self.registry),
            history: Arc::clone(&self.history),
            bus: self.bus.clone(),
        }));
        Submission { monitor, token }
    }

    /// Looks up a monitor (active or recently finished).
    pub fn monitor(&self, id: TaskId) -> Option<TaskMonitor> {
        self.registry.get(id)
    }

    /// Sorted ids of active monitors.
    pub fn list(&self) -> Vec<TaskId> {
        self.registry.list()
    }

    /// Cancels task `id`, waiting up to [`Config::cancel_timeout`].
    ///
    /// See [`TaskMonitor::cancel`] for the meaning of the result.
    pub async fn cancel(&self, id: TaskId, token: &CancelToken) -> Result<bool, RuntimeError> {
        self.cancel_with_timeout(id, token, self.cfg.cancel_timeout)
            .await
    }

    /// Cancels task `id`, waiting up to `timeout`.
    ///
    /// # Errors
    /// - [`RuntimeError::NotFound`]: `id` is unknown (or already evicted)
    /// - [`RuntimeError::IncorrectToken`]: `token` does not belong to the task
    pub async fn cancel_with_timeout(
        &self,
        id: TaskId,
        token: &CancelToken,
        timeout: Duration,
    ) -> Result<bool, RuntimeError> {
        let monitor = self.registry.get(id).ok_or_else(|| RuntimeError::NotFound {
            task_id: id.to_string(),
        })?;

        if !monitor.token_matches(token) {
            self.bus.publish(
                Event::new(EventKind::CancelRejected)
                    .with_task_id(id)
                    .with_task(monitor.name()),
            );
        } else if !monitor.is_done() {
            self.bus.publish(
                Event::new(EventKind::CancelRequested)
                    .with_task_id(id)
                    .with_task(monitor.name())
                    .with_timeout(timeout),
            );
        }

        monitor.cancel(token, timeout).await
    }

    /// Cancels every active task and waits up to [`Config::grace`] for them to stop.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] listing the tasks still running at the deadline.
    /// They keep running in the background; nothing is forcibly aborted.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        let grace = self.cfg.shutdown_grace().unwrap_or(Duration::ZERO);
        let active = self.registry.active_with_tokens();
        debug!(active = active.len(), ?grace, "shutting down");

        join_all(active.iter().map(|(m, token)| m.cancel(token, grace))).await;

        let stuck: Vec<String> = active
            .iter()
            .filter(|(m, _)| !m.is_done())
            .map(|(m, _)| m.name().to_string())
            .collect();

        if stuck.is_empty() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            Ok(())
        } else {
            warn!(?stuck, ?grace, "tasks still running after grace period");
            self.bus
                .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
            Err(RuntimeError::GraceExceeded {
                grace: self.cfg.grace,
                stuck,
            })
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}

/// Supervisor's own completion callback: history, event, retirement.
struct Retire {
    key: Arc<str>,
    registry: Weak<Registry>,
    history: Arc<dyn RunHistory>,
    bus: Bus,
}

impl Retire {
    fn finish(&self, monitor: &TaskMonitor) {
        if let Some(record) = RunRecord::from_monitor(monitor) {
            self.history.record(&self.key, record);
        }
        if let Some(ev) = Event::finished(monitor) {
            self.bus.publish(ev);
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.retire(monitor.id());
        }
    }
}

impl MonitorCallback for Retire {
    fn on_success(&self, monitor: &TaskMonitor) {
        self.finish(monitor);
    }

    fn on_failure(&self, monitor: &TaskMonitor, _error: &TaskError) {
        self.finish(monitor);
    }

    fn on_cancel(&self, monitor: &TaskMonitor) {
        self.finish(monitor);
    }
}

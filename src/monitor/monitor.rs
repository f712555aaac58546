//! # TaskMonitor: lifecycle wrapper around one running task.
//!
//! A monitor owns a dedicated worker (one Tokio task) that drives [`Task::run`] to
//! completion. Every other operation is called from arbitrary tasks/threads and never
//! blocks the worker.
//!
//! ## Lifecycle
//! ```text
//! TaskMonitor::spawn(task, origin) ──► (monitor, cancel token)
//!        │
//!        └─► worker: task.run().await  (panics caught)
//!                 ├─ Ok(())                       ─► Successful
//!                 ├─ Err(e) if e.is_cancellation() ─► Canceled
//!                 └─ Err(e)                       ─► Failed
//!                        │
//!                        ▼
//!            transition (first write wins, short lock)
//!                 ├─► freeze progress + keep error
//!                 ├─► take pending callbacks
//!                 └─► (lock released) run callbacks, then wake waiters
//! ```
//!
//! ## Rules
//! - The terminal state is written **once**; later attempts are no-ops.
//! - Callbacks fire **exactly once**: queued while running, invoked synchronously when
//!   registered after the transition. A panicking callback is logged and isolated.
//! - `await_completion` returns only after the callbacks queued before the transition ran.
//! - `cancel` never interrupts the worker; it asks the task and waits, bounded by a timeout.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, warn};

use crate::error::{RuntimeError, TaskError};
use crate::monitor::callback::MonitorCallback;
use crate::monitor::context::{Origin, RequestContext};
use crate::monitor::state::MonitorState;
use crate::monitor::token::{CancelToken, TaskId};
use crate::progress::Progress;
use crate::tasks::TaskRef;

/// Serializable view of a monitor for UI polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    /// Task id.
    pub id: TaskId,
    /// Task name.
    pub name: String,
    /// Node the task runs on.
    pub node_id: String,
    /// Lifecycle state.
    pub state: MonitorState,
    /// Current (or frozen) progress.
    pub progress: Progress,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Time spent so far, or total run time once terminal.
    pub elapsed_ms: u64,
}

/// Terminal outcome kept by the monitor after the transition.
#[derive(Clone)]
struct Terminal {
    state: MonitorState,
    progress: Progress,
    error: Option<Arc<TaskError>>,
    elapsed: Duration,
}

#[derive(Default)]
struct Slot {
    terminal: Option<Terminal>,
    pending: Vec<Arc<dyn MonitorCallback>>,
}

struct Inner {
    id: TaskId,
    origin: Origin,
    token: CancelToken,
    started_at: DateTime<Utc>,
    started: Instant,
    task: TaskRef,
    slot: Mutex<Slot>,
    state: watch::Sender<MonitorState>,
}

/// Handle to a running (or finished) task. Cheap to clone.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use taskmon::{MonitorState, Origin, TaskControl, TaskError, TaskFn, TaskMonitor};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let task = TaskFn::arc("reindex", |ctl: TaskControl| async move {
///         loop {
///             ctl.checkpoint()?;
///             tokio::time::sleep(Duration::from_millis(5)).await;
///         }
///     });
///
///     let (monitor, token) = TaskMonitor::spawn(task, Origin::system("node-1"));
///     assert_eq!(monitor.state(), MonitorState::Running);
///
///     let honored = monitor.cancel(&token, Duration::from_secs(1)).await.unwrap();
///     assert!(honored);
///     assert_eq!(monitor.await_completion().await, MonitorState::Canceled);
/// }
/// ```
#[derive(Clone)]
pub struct TaskMonitor {
    inner: Arc<Inner>,
}

impl TaskMonitor {
    /// Starts `task` on a dedicated worker and returns the monitor plus its cancel token.
    ///
    /// The token is the only credential able to cancel the task; hand it to the requester
    /// and nobody else. Must be called inside a Tokio runtime.
    pub fn spawn(task: TaskRef, origin: Origin) -> (TaskMonitor, CancelToken) {
        let token = CancelToken::new();
        let (state, _rx) = watch::channel(MonitorState::Running);
        let monitor = TaskMonitor {
            inner: Arc::new(Inner {
                id: TaskId::new(),
                origin,
                token: token.clone(),
                started_at: Utc::now(),
                started: Instant::now(),
                task,
                slot: Mutex::new(Slot::default()),
                state,
            }),
        };

        debug!(
            task_id = %monitor.id(),
            task = monitor.name(),
            node = monitor.node_id(),
            "task starting"
        );

        let worker = monitor.clone();
        tokio::spawn(worker.drive());
        (monitor, token)
    }

    /// Worker body: run once, classify, transition.
    async fn drive(self) {
        let outcome = AssertUnwindSafe(self.inner.task.run()).catch_unwind().await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(TaskError::Panicked {
                info: panic_message(panic.as_ref()),
            }),
        };
        self.complete(result);
    }

    /// Terminal transition. Only the first call has an effect.
    fn complete(&self, result: Result<(), TaskError>) {
        let state = match &result {
            Ok(()) => MonitorState::Successful,
            Err(e) if e.is_cancellation() => MonitorState::Canceled,
            Err(_) => MonitorState::Failed,
        };
        let last = self.inner.task.progress();
        let progress = match state {
            MonitorState::Failed => last,
            _ => Progress::completed(last.message()),
        };
        let terminal = Terminal {
            state,
            progress,
            error: result.err().map(Arc::new),
            elapsed: self.inner.started.elapsed(),
        };

        let callbacks = {
            let mut slot = self.inner.slot.lock();
            if slot.terminal.is_some() {
                return;
            }
            slot.terminal = Some(terminal.clone());
            std::mem::take(&mut slot.pending)
        };

        match (&terminal.state, &terminal.error) {
            (MonitorState::Failed, Some(err)) => warn!(
                task_id = %self.id(),
                task = self.name(),
                error = %err,
                label = err.as_label(),
                causes = ?err.causes(),
                "task failed"
            ),
            (state, _) => debug!(
                task_id = %self.id(),
                task = self.name(),
                %state,
                elapsed_ms = terminal.elapsed.as_millis() as u64,
                "task finished"
            ),
        }

        for callback in &callbacks {
            self.notify(callback.as_ref(), &terminal);
        }
        self.inner.state.send_replace(state);
    }

    /// Invokes the callback method matching the terminal state, isolating panics.
    fn notify(&self, callback: &dyn MonitorCallback, terminal: &Terminal) {
        let res = std::panic::catch_unwind(AssertUnwindSafe(|| match terminal.state {
            MonitorState::Successful => callback.on_success(self),
            MonitorState::Canceled => callback.on_cancel(self),
            MonitorState::Failed => {
                if let Some(err) = &terminal.error {
                    callback.on_failure(self, err);
                }
            }
            MonitorState::Running => {}
        }));
        if let Err(panic) = res {
            error!(
                task_id = %self.id(),
                info = %panic_message(panic.as_ref()),
                "monitor callback panicked"
            );
        }
    }

    /// Unique id of this execution.
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Name of the wrapped task.
    pub fn name(&self) -> &str {
        self.inner.task.name()
    }

    /// Node the task runs on.
    pub fn node_id(&self) -> &str {
        self.inner.origin.node_id()
    }

    /// Session that started the task, if any.
    pub fn owner_session(&self) -> Option<&str> {
        self.inner.origin.session_id()
    }

    /// Wall-clock start time.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Time since start, or total run time once terminal.
    pub fn elapsed(&self) -> Duration {
        match &self.inner.slot.lock().terminal {
            Some(t) => t.elapsed,
            None => self.inner.started.elapsed(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        self.inner
            .slot
            .lock()
            .terminal
            .as_ref()
            .map_or(MonitorState::Running, |t| t.state)
    }

    /// Returns `true` once the task reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Current progress: read-through while running, frozen once terminal.
    ///
    /// Successful and canceled tasks freeze at 100% with their last message; failed
    /// tasks keep the last progress they published.
    pub fn progress(&self) -> Progress {
        if let Some(t) = &self.inner.slot.lock().terminal {
            return t.progress.clone();
        }
        self.inner.task.progress()
    }

    /// The error the task ended with, if it failed or was canceled.
    pub fn failure(&self) -> Option<Arc<TaskError>> {
        self.inner
            .slot
            .lock()
            .terminal
            .as_ref()
            .and_then(|t| t.error.clone())
    }

    /// Serializable view for polling clients.
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            id: self.id(),
            name: self.name().to_string(),
            node_id: self.node_id().to_string(),
            state: self.state(),
            progress: self.progress(),
            started_at: self.started_at(),
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }

    /// `true` iff `ctx`'s active session is the one that started the task.
    pub fn is_owner(&self, ctx: &dyn RequestContext) -> bool {
        self.inner.origin.is_owned_by(ctx)
    }

    pub(crate) fn token_matches(&self, token: &CancelToken) -> bool {
        *token == self.inner.token
    }

    /// Waits until the task reaches a terminal state. Any number of callers may wait.
    pub async fn await_completion(&self) -> MonitorState {
        let mut rx = self.inner.state.subscribe();
        let observed = rx.wait_for(MonitorState::is_terminal).await.map(|s| *s);
        observed.unwrap_or_else(|_| self.state())
    }

    /// Requests cancellation and waits up to `timeout` for the task to stop.
    ///
    /// Returns:
    /// - `Err(IncorrectToken)` if `token` is not this task's token (nothing is touched);
    /// - `Ok(true)` if the task ended `Canceled` (it detected and honored the request);
    /// - `Ok(false)` if it ended `Successful`/`Failed`, or is still running at the deadline.
    ///
    /// The worker is never interrupted; after a timeout it keeps running in the background.
    /// Calling this again, or after the task finished, is safe.
    pub async fn cancel(
        &self,
        token: &CancelToken,
        timeout: Duration,
    ) -> Result<bool, RuntimeError> {
        if !self.token_matches(token) {
            warn!(
                task_id = %self.id(),
                task = self.name(),
                "cancel rejected: incorrect token"
            );
            return Err(RuntimeError::IncorrectToken {
                task_id: self.id().to_string(),
            });
        }

        let current = self.state();
        if current.is_terminal() {
            return Ok(current == MonitorState::Canceled);
        }

        debug!(task_id = %self.id(), task = self.name(), ?timeout, "cancel requested");
        self.inner.task.cancel();

        match time::timeout(timeout, self.await_completion()).await {
            Ok(state) => Ok(state == MonitorState::Canceled),
            Err(_elapsed) => {
                debug!(task_id = %self.id(), ?timeout, "task still running after cancel timeout");
                Ok(false)
            }
        }
    }

    /// Registers a completion callback.
    ///
    /// Invoked synchronously before returning if the task is already terminal, otherwise
    /// queued and invoked exactly once at the transition.
    pub fn register_callback(&self, callback: Arc<dyn MonitorCallback>) {
        let terminal = {
            let mut slot = self.inner.slot.lock();
            if slot.terminal.is_none() {
                slot.pending.push(callback);
                return;
            }
            slot.terminal.clone()
        };
        if let Some(terminal) = terminal {
            self.notify(callback.as_ref(), &terminal);
        }
    }
}

impl fmt::Debug for TaskMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskMonitor")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("node_id", &self.node_id())
            .field("state", &self.state())
            .finish()
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Notify;

    use crate::monitor::context::SessionContext;
    use crate::tasks::{TaskControl, TaskFn};

    const WINDOW: Duration = Duration::from_secs(2);

    /// Counts every callback invocation by kind.
    #[derive(Default)]
    struct Counter {
        success: AtomicUsize,
        failure: AtomicUsize,
        cancel: AtomicUsize,
    }

    impl Counter {
        fn total(&self) -> usize {
            self.success.load(Ordering::SeqCst)
                + self.failure.load(Ordering::SeqCst)
                + self.cancel.load(Ordering::SeqCst)
        }
    }

    impl MonitorCallback for Counter {
        fn on_success(&self, _m: &TaskMonitor) {
            self.success.fetch_add(1, Ordering::SeqCst);
        }
        fn on_failure(&self, _m: &TaskMonitor, _e: &TaskError) {
            self.failure.fetch_add(1, Ordering::SeqCst);
        }
        fn on_cancel(&self, _m: &TaskMonitor) {
            self.cancel.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Waits for `gate`, ignoring cancellation, then returns `result()`.
    fn gated(gate: Arc<Notify>, result: fn() -> Result<(), TaskError>) -> TaskRef {
        TaskFn::arc("gated", move |ctl: TaskControl| {
            let gate = gate.clone();
            async move {
                ctl.report("waiting for gate", 10).ok();
                gate.notified().await;
                result()
            }
        })
    }

    /// Runs until cancelled, then honors it.
    fn cooperative() -> TaskRef {
        TaskFn::arc("cooperative", |ctl: TaskControl| async move {
            ctl.report("looping", 5).ok();
            ctl.cancelled().await;
            ctl.checkpoint()
        })
    }

    fn system() -> Origin {
        Origin::system("node-a")
    }

    #[tokio::test]
    async fn success_freezes_progress_at_100() {
        let task = TaskFn::arc("backup", |ctl: TaskControl| async move {
            ctl.report("Writing archive", 90).ok();
            Ok(())
        });
        let (m, _token) = TaskMonitor::spawn(task, system());
        assert_eq!(m.await_completion().await, MonitorState::Successful);
        assert_eq!(m.progress(), Progress::completed("Writing archive"));
        assert!(m.failure().is_none());
        assert_eq!(m.name(), "backup");
    }

    #[tokio::test]
    async fn failure_keeps_last_progress_and_error() {
        let task = TaskFn::arc("restore", |ctl: TaskControl| async move {
            ctl.report("Importing", 40).ok();
            Err(TaskError::fail("corrupt archive"))
        });
        let (m, _token) = TaskMonitor::spawn(task, system());
        assert_eq!(m.await_completion().await, MonitorState::Failed);
        assert_eq!(m.progress(), Progress::new("Importing", 40).unwrap());
        let err = m.failure().unwrap();
        assert!(err.to_string().contains("corrupt archive"));
    }

    #[tokio::test]
    async fn failure_keeps_original_cause() {
        let task = TaskFn::arc("export", |_ctl: TaskControl| async move {
            let io = std::io::Error::new(std::io::ErrorKind::StorageFull, "no space left");
            Err(TaskError::caused_by(io))
        });
        let (m, _token) = TaskMonitor::spawn(task, system());
        assert_eq!(m.await_completion().await, MonitorState::Failed);

        let err = m.failure().unwrap();
        let cause = std::error::Error::source(err.as_ref()).expect("cause kept");
        assert_eq!(
            cause.downcast_ref::<std::io::Error>().map(|e| e.kind()),
            Some(std::io::ErrorKind::StorageFull)
        );
        assert_eq!(err.causes(), vec!["no space left".to_string()]);
    }

    #[tokio::test]
    async fn panic_in_run_is_failure() {
        let task = TaskFn::arc("boom", |_ctl: TaskControl| async move {
            if true {
                panic!("index writer poisoned");
            }
            Ok(())
        });
        let (m, _token) = TaskMonitor::spawn(task, system());
        assert_eq!(m.await_completion().await, MonitorState::Failed);
        assert!(matches!(
            m.failure().as_deref(),
            Some(TaskError::Panicked { info }) if info.contains("poisoned")
        ));
    }

    #[tokio::test]
    async fn outcome_follows_result_even_after_cancel_request() {
        let cases: [(fn() -> Result<(), TaskError>, MonitorState); 3] = [
            (|| Ok(()), MonitorState::Successful),
            (|| Err(TaskError::fail("lost connection")), MonitorState::Failed),
            (|| Err(TaskError::canceled()), MonitorState::Canceled),
        ];

        for (result, expected) in cases {
            let gate = Arc::new(Notify::new());
            let (m, token) = TaskMonitor::spawn(gated(gate.clone(), result), system());

            // The task ignores the flag, so the bounded wait elapses.
            let honored = m.cancel(&token, Duration::from_millis(30)).await.unwrap();
            assert!(!honored);
            assert_eq!(m.state(), MonitorState::Running);

            gate.notify_one();
            assert_eq!(m.await_completion().await, expected);
        }
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized_and_changes_nothing() {
        let control = TaskControl::default();
        let task = Arc::new(TaskFn::with_control(
            "guarded",
            control.clone(),
            |ctl: TaskControl| async move {
                ctl.cancelled().await;
                ctl.checkpoint()
            },
        ));
        let (m, token) = TaskMonitor::spawn(task, system());

        let err = m
            .cancel(&CancelToken::new(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Unauthorized);
        assert!(!control.is_cancelled());
        assert_eq!(m.state(), MonitorState::Running);

        assert!(m.cancel(&token, WINDOW).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_honored_returns_true_and_is_idempotent() {
        let (m, token) = TaskMonitor::spawn(cooperative(), system());
        assert!(m.cancel(&token, WINDOW).await.unwrap());
        assert_eq!(m.state(), MonitorState::Canceled);
        assert_eq!(m.progress().percentage(), 100);

        // Second call observes the terminal state immediately.
        assert!(m.cancel(&token, Duration::ZERO).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_returns_false_when_task_finishes_anyway() {
        let task = TaskFn::arc("stubborn", |ctl: TaskControl| async move {
            ctl.cancelled().await;
            Ok(())
        });
        let (m, token) = TaskMonitor::spawn(task, system());
        assert!(!m.cancel(&token, WINDOW).await.unwrap());
        assert_eq!(m.state(), MonitorState::Successful);
    }

    #[tokio::test]
    async fn cancel_returns_false_when_task_fails_instead() {
        let task = TaskFn::arc("flaky", |ctl: TaskControl| async move {
            ctl.cancelled().await;
            Err(TaskError::fail("rollback failed"))
        });
        let (m, token) = TaskMonitor::spawn(task, system());
        assert!(!m.cancel(&token, WINDOW).await.unwrap());
        assert_eq!(m.state(), MonitorState::Failed);
    }

    #[tokio::test]
    async fn cancel_timeout_leaves_worker_running() {
        let gate = Arc::new(Notify::new());
        let (m, token) = TaskMonitor::spawn(gated(gate.clone(), || Ok(())), system());

        assert!(!m.cancel(&token, Duration::from_millis(20)).await.unwrap());
        assert!(!m.is_done());

        gate.notify_one();
        assert_eq!(m.await_completion().await, MonitorState::Successful);
    }

    #[tokio::test]
    async fn callback_after_terminal_runs_synchronously_once() {
        let task = TaskFn::arc("quick", |_ctl: TaskControl| async move { Ok(()) });
        let (m, _token) = TaskMonitor::spawn(task, system());
        m.await_completion().await;

        let counter = Arc::new(Counter::default());
        m.register_callback(counter.clone());
        assert_eq!(counter.success.load(Ordering::SeqCst), 1);
        assert_eq!(counter.total(), 1);
    }

    #[tokio::test]
    async fn queued_callbacks_all_fire_exactly_once() {
        let gate = Arc::new(Notify::new());
        let (m, _token) = TaskMonitor::spawn(
            gated(gate.clone(), || Err(TaskError::fail("x"))),
            system(),
        );

        let counters: Vec<Arc<Counter>> = (0..3).map(|_| Arc::new(Counter::default())).collect();
        for c in &counters {
            m.register_callback(c.clone());
        }
        assert!(counters.iter().all(|c| c.total() == 0));

        gate.notify_one();
        m.await_completion().await;
        m.await_completion().await;

        for c in &counters {
            assert_eq!(c.failure.load(Ordering::SeqCst), 1);
            assert_eq!(c.total(), 1);
        }
    }

    #[tokio::test]
    async fn panicking_callback_does_not_starve_others() {
        struct Explodes;
        impl MonitorCallback for Explodes {
            fn on_cancel(&self, _m: &TaskMonitor) {
                panic!("listener bug");
            }
        }

        let (m, token) = TaskMonitor::spawn(cooperative(), system());
        let counter = Arc::new(Counter::default());
        m.register_callback(Arc::new(Explodes));
        m.register_callback(counter.clone());

        assert!(m.cancel(&token, WINDOW).await.unwrap());
        assert_eq!(counter.cancel.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn many_waiters_wake_together() {
        let gate = Arc::new(Notify::new());
        let (m, _token) = TaskMonitor::spawn(gated(gate.clone(), || Ok(())), system());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let m = m.clone();
                tokio::spawn(async move { m.await_completion().await })
            })
            .collect();

        tokio::task::yield_now().await;
        gate.notify_one();

        for w in waiters {
            assert_eq!(w.await.unwrap(), MonitorState::Successful);
        }
    }

    #[tokio::test]
    async fn progress_reads_through_while_running() {
        let gate = Arc::new(Notify::new());
        let control = TaskControl::default();
        let task = Arc::new(TaskFn::with_control("mirror", control.clone(), {
            let gate = gate.clone();
            move |_ctl: TaskControl| {
                let gate = gate.clone();
                async move {
                    gate.notified().await;
                    Ok(())
                }
            }
        }));
        let (m, _token) = TaskMonitor::spawn(task, system());

        control.report("Copying", 33).unwrap();
        assert_eq!(m.progress(), Progress::new("Copying", 33).unwrap());
        assert_eq!(m.snapshot().state, MonitorState::Running);

        gate.notify_one();
        m.await_completion().await;
        assert_eq!(m.snapshot().progress, Progress::completed("Copying"));
    }

    #[tokio::test]
    async fn ownership_uses_captured_session() {
        let origin = Origin::new("node-a", &SessionContext::new("sess-1"));
        let (m, _token) = TaskMonitor::spawn(cooperative(), origin);

        assert!(m.is_owner(&SessionContext::new("sess-1")));
        assert!(!m.is_owner(&SessionContext::new("sess-2")));
        assert_eq!(m.owner_session(), Some("sess-1"));
        assert_eq!(m.node_id(), "node-a");
    }

    #[tokio::test]
    async fn second_transition_is_ignored() {
        let task = TaskFn::arc("once", |_ctl: TaskControl| async move { Ok(()) });
        let (m, _token) = TaskMonitor::spawn(task, system());
        assert_eq!(m.await_completion().await, MonitorState::Successful);

        m.complete(Err(TaskError::fail("late")));
        assert_eq!(m.state(), MonitorState::Successful);
        assert!(m.failure().is_none());
    }
}

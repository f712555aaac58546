//! Integration tests for the supervisor: submissions, jobs, history, cancel routing,
//! events and graceful shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use taskmon::{
    CancelToken, Config, ErrorKind, Event, EventKind, InMemoryHistory, Job, MonitorState,
    RunOutcome, RuntimeError, SessionContext, Subscribe, Supervisor, TaskControl, TaskError,
    TaskFn, TaskId, TaskRef,
};

const WINDOW: Duration = Duration::from_secs(2);

fn ctx() -> SessionContext {
    SessionContext::new("admin-1")
}

fn supervisor(history: Arc<InMemoryHistory>) -> Arc<Supervisor> {
    let cfg = Config {
        node_id: Arc::from("node-a"),
        grace: Duration::from_millis(500),
        cancel_timeout: WINDOW,
        ..Config::default()
    };
    Supervisor::builder(cfg).with_history(history).build()
}

/// Loops until cancelled, then honors the request.
fn cooperative(name: &'static str) -> TaskRef {
    TaskFn::arc(name, |ctl: TaskControl| async move {
        ctl.report("Working", 10)?;
        ctl.cancelled().await;
        ctl.checkpoint()
    })
}

/// Job whose task waits on a gate; its prerequisite can be toggled.
struct GatedJob {
    gate: Arc<Notify>,
    locked: AtomicBool,
}

impl GatedJob {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Arc::new(Notify::new()),
            locked: AtomicBool::new(false),
        })
    }
}

impl Job for GatedJob {
    fn key(&self) -> &str {
        "reindex"
    }

    fn check(&self) -> Result<(), String> {
        if self.locked.load(Ordering::SeqCst) {
            Err("maintenance lock held by node-b".to_string())
        } else {
            Ok(())
        }
    }

    fn create(&self) -> TaskRef {
        let gate = self.gate.clone();
        TaskFn::arc("reindex", move |ctl: TaskControl| {
            let gate = gate.clone();
            async move {
                ctl.report("Rebuilding index", 50)?;
                gate.notified().await;
                Ok(())
            }
        })
    }
}

#[tokio::test]
async fn submitted_task_is_recorded_and_retired() {
    let history = Arc::new(InMemoryHistory::new(16));
    let sup = supervisor(history.clone());

    let task = TaskFn::arc("export", |ctl: TaskControl| async move {
        ctl.report("Exporting users", 80)?;
        Ok(())
    });
    let run = sup.submit(task, &ctx());
    assert_eq!(run.monitor.node_id(), "node-a");
    assert!(run.monitor.is_owner(&ctx()));

    assert_eq!(run.monitor.await_completion().await, MonitorState::Successful);

    let rec = history.last("export").expect("record written before waiters wake");
    assert_eq!(rec.outcome(), RunOutcome::Success);
    assert_eq!(rec.message(), "Exporting users");

    assert!(sup.list().is_empty());
    let retired = sup.monitor(run.monitor.id()).expect("retired monitor stays queryable");
    assert_eq!(retired.state(), MonitorState::Successful);
}

#[tokio::test]
async fn failed_task_records_error_text() {
    let history = Arc::new(InMemoryHistory::new(16));
    let sup = supervisor(history.clone());

    let task = TaskFn::arc("restore", |ctl: TaskControl| async move {
        ctl.report("Importing", 40)?;
        Err(TaskError::fail("archive checksum mismatch"))
    });
    let run = sup.submit(task, &ctx());
    assert_eq!(run.monitor.await_completion().await, MonitorState::Failed);

    let rec = history.last("restore").unwrap();
    assert_eq!(rec.outcome(), RunOutcome::Failed);
    assert!(rec.message().contains("archive checksum mismatch"));
    assert_eq!(run.monitor.progress().percentage(), 40);
}

#[tokio::test]
async fn unknown_job_is_unavailable_and_recorded() {
    let history = Arc::new(InMemoryHistory::new(16));
    let sup = supervisor(history.clone());

    let err = sup.run_job("backup", &ctx()).unwrap_err();
    assert!(matches!(err, RuntimeError::JobUnavailable { .. }));
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(history.last("backup").unwrap().outcome(), RunOutcome::Unavailable);
}

#[tokio::test]
async fn unmet_prerequisites_abort_without_starting() {
    let history = Arc::new(InMemoryHistory::new(16));
    let job = GatedJob::new();
    job.locked.store(true, Ordering::SeqCst);
    let sup = Supervisor::builder(Config::default())
        .with_history(history.clone())
        .with_job(job.clone())
        .build();

    let err = sup.run_job("reindex", &ctx()).unwrap_err();
    assert!(matches!(err, RuntimeError::JobAborted { ref reason, .. } if reason.contains("node-b")));
    assert!(sup.list().is_empty());

    let rec = history.last("reindex").unwrap();
    assert_eq!(rec.outcome(), RunOutcome::Aborted);
    assert_eq!(rec.duration_ms(), 0);
}

#[tokio::test]
async fn one_execution_per_job_at_a_time() {
    let history = Arc::new(InMemoryHistory::new(16));
    let job = GatedJob::new();
    let sup = Supervisor::builder(Config::default())
        .with_history(history.clone())
        .with_job(job.clone())
        .build();
    assert_eq!(sup.jobs(), vec!["reindex"]);

    let first = sup.run_job("reindex", &ctx()).unwrap();
    let err = sup.run_job("reindex", &ctx()).unwrap_err();
    assert!(matches!(err, RuntimeError::JobAlreadyRunning { .. }));
    assert!(history.records("reindex").is_empty());

    job.gate.notify_one();
    assert_eq!(first.monitor.await_completion().await, MonitorState::Successful);

    let second = sup.run_job("reindex", &ctx()).unwrap();
    assert_ne!(second.monitor.id(), first.monitor.id());
    job.gate.notify_one();
    second.monitor.await_completion().await;
    assert_eq!(history.records("reindex").len(), 2);
}

#[tokio::test]
async fn cancel_is_routed_by_id_and_checked() {
    let history = Arc::new(InMemoryHistory::new(16));
    let sup = supervisor(history.clone());
    let run = sup.submit(cooperative("reindex"), &ctx());

    let err = sup.cancel(TaskId::new(), &run.token).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = sup
        .cancel(run.monitor.id(), &CancelToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(run.monitor.state(), MonitorState::Running);

    assert!(sup.cancel(run.monitor.id(), &run.token).await.unwrap());
    let rec = history.last("reindex").unwrap();
    assert_eq!(rec.outcome(), RunOutcome::Aborted);
    assert_eq!(rec.message(), "canceled");

    // Still found after retirement; repeated cancel reports the same outcome.
    assert!(sup.cancel(run.monitor.id(), &run.token).await.unwrap());
}

#[tokio::test]
async fn shutdown_stops_cooperative_tasks() {
    let history = Arc::new(InMemoryHistory::new(16));
    let sup = supervisor(history.clone());
    let runs: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|name| sup.submit(cooperative(name), &ctx()))
        .collect();

    sup.shutdown().await.unwrap();
    for run in &runs {
        assert_eq!(run.monitor.state(), MonitorState::Canceled);
    }
    assert!(sup.registry().is_empty());
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn shutdown_reports_tasks_ignoring_cancellation() {
    let history = Arc::new(InMemoryHistory::new(16));
    let cfg = Config {
        grace: Duration::from_millis(50),
        ..Config::default()
    };
    let sup = Supervisor::builder(cfg).with_history(history).build();

    let gate = Arc::new(Notify::new());
    let stubborn = TaskFn::arc("migrate", {
        let gate = gate.clone();
        move |_ctl: TaskControl| {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                Ok(())
            }
        }
    });
    let run = sup.submit(stubborn, &ctx());
    sup.submit(cooperative("reindex"), &ctx());

    match sup.shutdown().await {
        Err(RuntimeError::GraceExceeded { stuck, .. }) => assert_eq!(stuck, vec!["migrate"]),
        other => panic!("expected GraceExceeded, got {other:?}"),
    }

    // The stubborn task was never interrupted; it finishes on its own terms.
    gate.notify_one();
    assert_eq!(run.monitor.await_completion().await, MonitorState::Successful);
}

/// Collects event kinds for assertions.
#[derive(Default)]
struct Recorder {
    kinds: Mutex<Vec<EventKind>>,
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.kinds.lock().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn subscribers_see_lifecycle_events() {
    let recorder = Arc::new(Recorder::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![recorder.clone()];
    let sup = Supervisor::builder(Config::default())
        .with_subscribers(subs)
        .build();
    assert_eq!(sup.subscriber_count(), 1);

    let run = sup.submit(cooperative("reindex"), &ctx());
    let _ = sup.cancel(run.monitor.id(), &CancelToken::new()).await;
    assert!(sup.cancel(run.monitor.id(), &run.token).await.unwrap());

    let expected = [
        EventKind::TaskSubmitted,
        EventKind::CancelRejected,
        EventKind::CancelRequested,
        EventKind::TaskCanceled,
    ];
    tokio::time::timeout(WINDOW, async {
        while recorder.kinds.lock().len() < expected.len() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("events delivered");

    assert_eq!(recorder.kinds.lock().as_slice(), &expected);
}

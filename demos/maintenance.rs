//! # Example: maintenance
//!
//! Runs a restore job as a weighted pipeline, polls its progress like a status page
//! would, then starts a second job and cancels it with its token.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► Supervisor with LogWriter + InMemoryHistory + two jobs
//!   ├─► run_job("restore")  ─► Pipeline[unzip (30), import (70)]
//!   │     └─► poll progress every 100ms until terminal
//!   ├─► run_job("reindex")  ─► cooperative loop
//!   │     └─► cancel(id, token) ─► Canceled (RunOutcome::Aborted)
//!   ├─► run_job("backup")   ─► Unavailable (no runner)
//!   └─► print history, shutdown
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example maintenance --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use taskmon::{
    Config, InMemoryHistory, Job, LogWriter, Pipeline, SessionContext, Subscribe, Supervisor,
    TaskControl, TaskFn, TaskRef,
};
use tracing_subscriber::EnvFilter;

/// Restore = unzip the archive, then import its rows.
struct Restore;

impl Job for Restore {
    fn key(&self) -> &str {
        "restore"
    }

    fn create(&self) -> TaskRef {
        let unzip = TaskFn::arc("unzip", |ctl: TaskControl| async move {
            for entry in 1..=5 {
                ctl.checkpoint()?;
                ctl.report(format!("Unzipping entry {entry}/5"), entry * 20)?;
                tokio::time::sleep(Duration::from_millis(60)).await;
            }
            Ok(())
        });
        let import = TaskFn::arc("import", |ctl: TaskControl| async move {
            for batch in 1..=10 {
                ctl.checkpoint()?;
                ctl.report(format!("Importing batch {batch}/10"), batch * 10)?;
                tokio::time::sleep(Duration::from_millis(40)).await;
            }
            Ok(())
        });

        let pipeline = Pipeline::builder("restore")
            .step(unzip, 30)
            .step(import, 70)
            .build()
            .expect("restore pipeline has steps");
        Arc::new(pipeline)
    }
}

/// Reindex loops until asked to stop.
struct Reindex;

impl Job for Reindex {
    fn key(&self) -> &str {
        "reindex"
    }

    fn create(&self) -> TaskRef {
        TaskFn::arc("reindex", |ctl: TaskControl| async move {
            let mut done = 0;
            loop {
                ctl.checkpoint()?;
                done = (done + 7).min(99);
                ctl.report("Rebuilding search index", done)?;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let history = Arc::new(InMemoryHistory::new(32));
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let cfg = Config {
        node_id: Arc::from("node-1"),
        grace: Duration::from_secs(2),
        ..Config::default()
    };
    let sup = Supervisor::builder(cfg)
        .with_subscribers(subs)
        .with_history(history.clone())
        .with_job(Arc::new(Restore))
        .with_job(Arc::new(Reindex))
        .build();

    let admin = SessionContext::new("admin-session");

    // 1. Restore, polled like a status page.
    let restore = sup.run_job("restore", &admin)?;
    while !restore.monitor.is_done() {
        println!("[poll] {}", restore.monitor.progress());
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    println!("[done] restore -> {}", restore.monitor.state());

    // 2. Reindex, canceled by its owner.
    let reindex = sup.run_job("reindex", &admin)?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let honored = sup.cancel(reindex.monitor.id(), &reindex.token).await?;
    println!("[cancel] reindex honored={honored} at {}", reindex.monitor.progress());

    // 3. A job nobody registered.
    if let Err(e) = sup.run_job("backup", &admin) {
        println!("[refused] {e}");
    }

    for job in ["restore", "reindex", "backup"] {
        for rec in history.records(job) {
            println!(
                "[history] {job}: {} in {}ms ({})",
                rec.outcome(),
                rec.duration_ms(),
                rec.message()
            );
        }
    }

    sup.shutdown().await?;
    Ok(())
}

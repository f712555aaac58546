use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{config::Config, job::Job, supervisor::Supervisor};
use crate::{
    events::Bus,
    record::{InMemoryHistory, RunHistory},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Supervisor`] with optional collaborators.
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    history: Option<Arc<dyn RunHistory>>,
    jobs: Vec<Arc<dyn Job>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            history: None,
            jobs: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events (submissions, terminal transitions, cancel
    /// requests, shutdown) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the run history collaborator.
    ///
    /// Defaults to an [`InMemoryHistory`] sized by [`Config::history_capacity`].
    pub fn with_history(mut self, history: Arc<dyn RunHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Registers a job runner. A later job with the same key replaces an earlier one.
    pub fn with_job(mut self, job: Arc<dyn Job>) -> Self {
        self.jobs.push(job);
        self
    }

    /// Builds and returns the Supervisor instance.
    ///
    /// Initializes the event bus, the subscriber workers and the listener that forwards
    /// bus events to them. Must be called inside a Tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let runtime_token = CancellationToken::new();

        let history = self.history.unwrap_or_else(|| {
            Arc::new(InMemoryHistory::new(self.cfg.history_capacity_clamped()))
        });

        let mut jobs: HashMap<String, Arc<dyn Job>> = HashMap::with_capacity(self.jobs.len());
        for job in self.jobs {
            let key = job.key().to_string();
            if jobs.insert(key.clone(), job).is_some() {
                warn!(job = %key, "job registered twice; keeping the last one");
            }
        }

        spawn_listener(&bus, Arc::clone(&subs), runtime_token.clone());

        Arc::new(Supervisor::new_internal(
            self.cfg,
            bus,
            subs,
            history,
            jobs,
            runtime_token,
        ))
    }
}

/// Forwards bus events to the subscriber set until the supervisor is dropped.
fn spawn_listener(bus: &Bus, subs: Arc<SubscriberSet>, runtime_token: CancellationToken) {
    if subs.is_empty() {
        return;
    }
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = runtime_token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.dispatch(ev),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged; events skipped");
                    }
                }
            }
        }
    });
}

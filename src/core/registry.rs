//! # Monitor registry.
//!
//! Tracks every monitor the supervisor started, keyed by [`TaskId`], so status pages
//! and cancel requests can find a task by id.
//!
//! ## Architecture
//! ```text
//! Supervisor::submit/run_job
//!     ├─► insert(monitor, token)      ──► active[id] = Entry{monitor, token}
//!     └─► insert_job(job, spawn)      ──► active[id] = Entry{monitor, token, job}
//!                                         jobs[job]  = id      (at most one per job)
//!
//! retire callback (terminal transition)
//!     └─► retire(id) ──► active → retired (bounded FIFO, oldest evicted)
//! ```
//!
//! ## Rules
//! - The registry is injected (owned by the supervisor), never a process-wide global.
//! - A job key maps to at most one active monitor; the check and the insert happen under
//!   one write lock.
//! - Finished monitors stay queryable through [`Registry::get`] until evicted from the
//!   retired list.
//! - Critical sections are short and synchronous (`parking_lot::RwLock`); never hold the
//!   lock across a monitor callback.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::RuntimeError;
use crate::monitor::{CancelToken, TaskId, TaskMonitor};

/// Registered monitor plus its credential.
#[derive(Clone)]
struct Entry {
    monitor: TaskMonitor,
    token: CancelToken,
    job: Option<Arc<str>>,
}

#[derive(Default)]
struct Tables {
    active: HashMap<TaskId, Entry>,
    jobs: HashMap<Arc<str>, TaskId>,
    retired: VecDeque<TaskMonitor>,
}

/// Registry of active and recently finished monitors.
pub struct Registry {
    retired_capacity: usize,
    tables: RwLock<Tables>,
}

impl Registry {
    /// Creates an empty registry keeping up to `retired_capacity` finished monitors.
    pub fn new(retired_capacity: usize) -> Self {
        Self {
            retired_capacity,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Registers a monitor that is not tied to a job.
    pub fn insert(&self, monitor: &TaskMonitor, token: &CancelToken) {
        self.tables.write().active.insert(
            monitor.id(),
            Entry {
                monitor: monitor.clone(),
                token: token.clone(),
                job: None,
            },
        );
    }

    /// Starts a monitor for `job` via `spawn` and registers it.
    ///
    /// When a monitor for `job` is still active, `spawn` is not called and
    /// [`RuntimeError::JobAlreadyRunning`] is returned.
    pub fn insert_job<F>(
        &self,
        job: &str,
        spawn: F,
    ) -> Result<(TaskMonitor, CancelToken), RuntimeError>
    where
        F: FnOnce() -> (TaskMonitor, CancelToken),
    {
        let mut tables = self.tables.write();
        if let Some(running) = tables.jobs.get(job) {
            return Err(RuntimeError::JobAlreadyRunning {
                job: job.to_string(),
                task_id: running.to_string(),
            });
        }

        let (monitor, token) = spawn();
        let key: Arc<str> = Arc::from(job);
        tables.jobs.insert(Arc::clone(&key), monitor.id());
        tables.active.insert(
            monitor.id(),
            Entry {
                monitor: monitor.clone(),
                token: token.clone(),
                job: Some(key),
            },
        );
        Ok((monitor, token))
    }

    /// Looks up a monitor by id: active first, then retired.
    pub fn get(&self, id: TaskId) -> Option<TaskMonitor> {
        let tables = self.tables.read();
        if let Some(entry) = tables.active.get(&id) {
            return Some(entry.monitor.clone());
        }
        tables.retired.iter().find(|m| m.id() == id).cloned()
    }

    /// Moves a finished monitor from the active table to the retired list.
    ///
    /// Returns `false` if `id` was not active.
    pub fn retire(&self, id: TaskId) -> bool {
        let mut tables = self.tables.write();
        let Some(entry) = tables.active.remove(&id) else {
            return false;
        };
        if let Some(key) = &entry.job {
            if tables.jobs.get(key) == Some(&id) {
                tables.jobs.remove(key);
            }
        }
        if self.retired_capacity > 0 {
            if tables.retired.len() == self.retired_capacity {
                tables.retired.pop_front();
            }
            tables.retired.push_back(entry.monitor);
        }
        true
    }

    /// Forgets a monitor entirely (active or retired).
    pub fn remove(&self, id: TaskId) -> Option<TaskMonitor> {
        let mut tables = self.tables.write();
        if let Some(entry) = tables.active.remove(&id) {
            if let Some(key) = &entry.job {
                if tables.jobs.get(key) == Some(&id) {
                    tables.jobs.remove(key);
                }
            }
            return Some(entry.monitor);
        }
        let pos = tables.retired.iter().position(|m| m.id() == id)?;
        tables.retired.remove(pos)
    }

    /// Sorted ids of active monitors.
    pub fn list(&self) -> Vec<TaskId> {
        let tables = self.tables.read();
        let mut ids: Vec<TaskId> = tables.active.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Active monitors (unordered).
    pub fn active(&self) -> Vec<TaskMonitor> {
        self.tables
            .read()
            .active
            .values()
            .map(|e| e.monitor.clone())
            .collect()
    }

    /// Finished monitors still retained, oldest first.
    pub fn retired(&self) -> Vec<TaskMonitor> {
        self.tables.read().retired.iter().cloned().collect()
    }

    /// The active monitor running `job`, if any.
    pub fn running_job(&self, job: &str) -> Option<TaskMonitor> {
        let tables = self.tables.read();
        let id = tables.jobs.get(job)?;
        tables.active.get(id).map(|e| e.monitor.clone())
    }

    /// Active monitors together with their tokens, for shutdown.
    pub(crate) fn active_with_tokens(&self) -> Vec<(TaskMonitor, CancelToken)> {
        self.tables
            .read()
            .active
            .values()
            .map(|e| (e.monitor.clone(), e.token.clone()))
            .collect()
    }

    /// Number of active monitors.
    pub fn len(&self) -> usize {
        self.tables.read().active.len()
    }

    /// Returns `true` if no monitor is active.
    pub fn is_empty(&self) -> bool {
        self.tables.read().active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::monitor::Origin;
    use crate::tasks::{TaskControl, TaskFn};

    fn idle() -> (TaskMonitor, CancelToken) {
        let task = TaskFn::arc("idle", |ctl: TaskControl| async move {
            ctl.cancelled().await;
            ctl.checkpoint()
        });
        TaskMonitor::spawn(task, Origin::system("node-a"))
    }

    #[tokio::test]
    async fn one_active_monitor_per_job() {
        let registry = Registry::new(4);
        let (first, _) = registry.insert_job("backup", idle).unwrap();

        let mut spawned = false;
        let err = registry
            .insert_job("backup", || {
                spawned = true;
                idle()
            })
            .unwrap_err();
        assert!(!spawned);
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(registry.running_job("backup").unwrap().id(), first.id());

        // Untagged submissions are never deduplicated.
        let (m, t) = idle();
        registry.insert(&m, &t);
        let (m, t) = idle();
        registry.insert(&m, &t);
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn retire_frees_job_and_keeps_monitor_queryable() {
        let registry = Registry::new(1);
        let (m1, _) = registry.insert_job("backup", idle).unwrap();
        assert!(registry.retire(m1.id()));
        assert!(!registry.retire(m1.id()));

        assert!(registry.running_job("backup").is_none());
        assert_eq!(registry.get(m1.id()).unwrap().id(), m1.id());
        assert!(registry.is_empty());

        let (m2, _) = registry.insert_job("backup", idle).unwrap();
        registry.retire(m2.id());
        assert!(registry.get(m1.id()).is_none());
        assert_eq!(registry.retired().len(), 1);
    }

    #[tokio::test]
    async fn zero_retention_drops_finished_monitors() {
        let registry = Registry::new(0);
        let (m, t) = idle();
        registry.insert(&m, &t);
        registry.retire(m.id());
        assert!(registry.get(m.id()).is_none());
    }

    #[tokio::test]
    async fn list_is_sorted_and_remove_forgets() {
        let registry = Registry::new(4);
        for _ in 0..5 {
            let (m, t) = idle();
            registry.insert(&m, &t);
        }
        let ids = registry.list();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        let gone = registry.remove(ids[0]).unwrap();
        assert_eq!(gone.id(), ids[0]);
        assert!(registry.get(ids[0]).is_none());
        assert_eq!(registry.active_with_tokens().len(), 4);
    }
}

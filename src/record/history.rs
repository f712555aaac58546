//! # Run history collaborator.
//!
//! The engine hands every finished (or refused) job execution to a [`RunHistory`].
//! Persisting it is the collaborator's business; [`InMemoryHistory`] keeps a bounded
//! window in memory, which is enough for status pages and tests.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::outcome::RunRecord;

/// Receiver of run records, one per job execution.
///
/// Called from the monitor's worker right after the terminal transition, so
/// implementations should return quickly (buffer, enqueue, or write to a fast store).
pub trait RunHistory: Send + Sync + 'static {
    /// Stores `record` for the job identified by `job`.
    fn record(&self, job: &str, record: RunRecord);
}

/// Bounded in-memory history; the oldest entries are evicted first.
#[derive(Debug)]
pub struct InMemoryHistory {
    capacity: usize,
    entries: Mutex<VecDeque<(String, RunRecord)>>,
}

impl InMemoryHistory {
    /// Creates a history holding at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Records for `job`, oldest first.
    pub fn records(&self, job: &str) -> Vec<RunRecord> {
        self.entries
            .lock()
            .iter()
            .filter(|(key, _)| key == job)
            .map(|(_, rec)| rec.clone())
            .collect()
    }

    /// Most recent record for `job`.
    pub fn last(&self, job: &str) -> Option<RunRecord> {
        self.entries
            .lock()
            .iter()
            .rev()
            .find(|(key, _)| key == job)
            .map(|(_, rec)| rec.clone())
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RunHistory for InMemoryHistory {
    fn record(&self, job: &str, record: RunRecord) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back((job.to_string(), record));
    }
}

//! Storage for terminal job snapshots
//!
//! Finished jobs leave the live registry and are kept here so pollers can
//! still read the outcome for a while.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::state::JobState;

/// Key-value store for finished job states
pub trait ResultStore: Send + Sync {
    /// Store the state of a job, replacing any previous entry
    fn put(&self, job_id: &str, state: JobState);

    /// Fetch a stored state, if present and not expired
    fn get(&self, job_id: &str) -> Option<JobState>;

    /// Number of entries currently held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct StoredResult {
    state: JobState,
    stored_at: Instant,
}

/// In-memory result store with TTL expiry and a capacity bound
pub struct InMemoryResultStore {
    entries: RwLock<HashMap<String, StoredResult>>,
    /// Maximum number of entries; the oldest is evicted first
    capacity: usize,
    ttl: Duration,
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }
}

impl InMemoryResultStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() <= self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("Purged {} expired job results", removed);
        }
        removed
    }
}

impl ResultStore for InMemoryResultStore {
    fn put(&self, job_id: &str, state: JobState) {
        let mut entries = self.entries.write();

        if !entries.contains_key(job_id) {
            entries.retain(|_, entry| entry.stored_at.elapsed() <= self.ttl);

            while entries.len() >= self.capacity {
                let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(key, _)| key.clone())
                else {
                    break;
                };
                tracing::debug!("Evicting job result {}", oldest);
                entries.remove(&oldest);
            }
        }

        entries.insert(
            job_id.to_string(),
            StoredResult {
                state,
                stored_at: Instant::now(),
            },
        );
    }

    fn get(&self, job_id: &str) -> Option<JobState> {
        {
            let entries = self.entries.read();
            match entries.get(job_id) {
                Some(entry) if entry.stored_at.elapsed() <= self.ttl => {
                    return Some(entry.state.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Expired
        self.entries.write().remove(job_id);
        None
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

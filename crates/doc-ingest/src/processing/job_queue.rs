//! Job queue for background document ingestion
//!
//! Live jobs sit in a registry of whole-state snapshots. When a job reaches a
//! terminal stage its snapshot moves to the [`ResultStore`].

use dashmap::DashMap;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::IngestOptions;

use super::result_store::ResultStore;
use super::state::{JobStage, JobState};

/// Prefix of job ids that run inside the request
pub const INLINE_JOB_PREFIX: &str = "sync_";

/// Where a job reads its document from
#[derive(Debug, Clone)]
pub enum JobSource {
    /// Uploaded file saved to disk
    Path(PathBuf),
    /// Document held in memory
    Bytes(Vec<u8>),
}

/// An ingestion job
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub job_id: String,
    pub filename: String,
    pub source: JobSource,
    pub options: IngestOptions,
}

impl IngestJob {
    /// Job for the background worker pool
    pub fn queued(filename: impl Into<String>, source: JobSource, options: IngestOptions) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            filename: filename.into(),
            source,
            options,
        }
    }

    /// Job that runs within the request
    pub fn inline(filename: impl Into<String>, source: JobSource, options: IngestOptions) -> Self {
        Self {
            job_id: format!("{}{}", INLINE_JOB_PREFIX, Uuid::new_v4()),
            filename: filename.into(),
            source,
            options,
        }
    }

    pub fn is_inline(&self) -> bool {
        self.job_id.starts_with(INLINE_JOB_PREFIX)
    }
}

/// Receives every state change of a running job
pub trait JobObserver: Send + Sync {
    fn publish(&self, state: &JobState);
}

/// Job queue with a live registry and a channel to the workers
pub struct JobQueue {
    /// Live (non-terminal) jobs
    jobs: Arc<DashMap<String, JobState>>,
    /// Terminal job snapshots
    results: Arc<dyn ResultStore>,
    /// Channel for sending jobs to workers
    sender: mpsc::Sender<IngestJob>,
    /// Number of workers
    worker_count: usize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl JobQueue {
    /// Create a new job queue
    pub fn new(
        worker_count: usize,
        capacity: usize,
        results: Arc<dyn ResultStore>,
    ) -> (Self, mpsc::Receiver<IngestJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        let queue = Self {
            jobs: Arc::new(DashMap::new()),
            results,
            sender,
            worker_count,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        };

        (queue, receiver)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Record a new job in the queued stage
    pub fn register(&self, job: &IngestJob) -> JobState {
        let state = JobState::new(job.job_id.clone(), job.filename.clone());
        self.jobs.insert(job.job_id.clone(), state.clone());
        state
    }

    /// Submit a job to the worker pool
    pub async fn submit(&self, job: IngestJob) -> Result<String> {
        let job_id = job.job_id.clone();
        let mut state = self.register(&job);

        tracing::info!("Queued job {} for {}", job_id, job.filename);

        if let Err(e) = self.sender.send(job).await {
            tracing::error!("Failed to submit job {}: {}", job_id, e);
            state.fail("Job queue is closed")?;
            self.publish(&state);
            return Err(Error::internal(format!("Failed to submit job {}", job_id)));
        }

        Ok(job_id)
    }

    /// Current state of a job, live or finished
    pub fn status(&self, job_id: &str) -> Option<JobState> {
        if let Some(state) = self.jobs.get(job_id) {
            return Some(state.clone());
        }
        self.results.get(job_id)
    }

    /// Live jobs, oldest first
    pub fn list_jobs(&self) -> Vec<JobState> {
        let mut jobs: Vec<JobState> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let queued = self
            .jobs
            .iter()
            .filter(|j| j.stage == JobStage::Queued)
            .count();
        let active = self.jobs.len();

        QueueStats {
            active_jobs: active,
            queued,
            running: active - queued,
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            stored_results: self.results.len(),
            worker_count: self.worker_count,
        }
    }
}

impl JobObserver for JobQueue {
    fn publish(&self, state: &JobState) {
        if state.is_terminal() {
            // Store before removing so pollers always find the job
            self.results.put(&state.job_id, state.clone());
            self.jobs.remove(&state.job_id);

            match state.stage {
                JobStage::Completed => self.completed.fetch_add(1, Ordering::SeqCst),
                _ => self.failed.fetch_add(1, Ordering::SeqCst),
            };
        } else {
            self.jobs.insert(state.job_id.clone(), state.clone());
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub active_jobs: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub stored_results: usize,
    pub worker_count: usize,
}

//! Ingestion job state machine
//!
//! Stages move strictly forward with a fixed progress checkpoint each.
//! `Failed` is reachable from any non-terminal stage and keeps the last
//! checkpoint, so progress never decreases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::JobSummary;

/// Processing stage of an ingestion job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    Parsing,
    Chunking,
    Embedding,
    Indexing,
    Completed,
    Failed,
}

impl JobStage {
    /// Progress percentage published when the stage is entered
    pub fn checkpoint(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Parsing => 10,
            Self::Chunking => 50,
            Self::Embedding => 80,
            Self::Indexing => 95,
            Self::Completed => 100,
            // Failed keeps whatever checkpoint the job had reached
            Self::Failed => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn order(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Parsing => 1,
            Self::Chunking => 2,
            Self::Embedding => 3,
            Self::Indexing => 4,
            Self::Completed => 5,
            Self::Failed => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Parsing => "parsing",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Indexing => "indexing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected job state transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("job {job_id} is already {stage}")]
    Terminal { job_id: String, stage: JobStage },

    #[error("job {job_id} cannot move from {from} to {to}")]
    Backwards {
        job_id: String,
        from: JobStage,
        to: JobStage,
    },
}

/// Snapshot of an ingestion job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: String,
    pub filename: String,
    pub stage: JobStage,
    /// 0-100, monotonically non-decreasing
    pub progress: u8,
    pub result: Option<JobSummary>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobState {
    /// New job in the queued stage
    pub fn new(job_id: impl Into<String>, filename: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            filename: filename.into(),
            stage: JobStage::Queued,
            progress: 0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    fn check_open(&self) -> Result<(), TransitionError> {
        if self.stage.is_terminal() {
            return Err(TransitionError::Terminal {
                job_id: self.job_id.clone(),
                stage: self.stage,
            });
        }
        Ok(())
    }

    /// Move to a later working stage
    ///
    /// Staying in the current stage is a no-op. Terminal stages are reached
    /// through [`complete`](Self::complete) and [`fail`](Self::fail).
    pub fn advance(&mut self, to: JobStage) -> Result<(), TransitionError> {
        self.check_open()?;
        if to.is_terminal() || to.order() < self.stage.order() {
            return Err(TransitionError::Backwards {
                job_id: self.job_id.clone(),
                from: self.stage,
                to,
            });
        }
        if to == self.stage {
            return Ok(());
        }

        self.stage = to;
        self.progress = self.progress.max(to.checkpoint());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Finish successfully with a result summary
    pub fn complete(&mut self, summary: JobSummary) -> Result<(), TransitionError> {
        self.check_open()?;
        self.stage = JobStage::Completed;
        self.progress = JobStage::Completed.checkpoint();
        self.result = Some(summary);
        self.error = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Finish with an error, keeping the progress reached so far
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.check_open()?;
        let mut error = error.into();
        if error.trim().is_empty() {
            error = format!("ingestion failed during {}", self.stage);
        }
        self.stage = JobStage::Failed;
        self.result = None;
        self.error = Some(error);
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> JobSummary {
        JobSummary {
            filename: "a.pdf".to_string(),
            total_pages: 1,
            content_hash: "00".to_string(),
            chunks_count: 0,
            embedded: false,
            embedding_dim: None,
            indexed: false,
            preview: Vec::new(),
        }
    }

    #[test]
    fn test_happy_path_checkpoints() {
        let mut job = JobState::new("job-1", "a.pdf");
        assert_eq!((job.stage, job.progress), (JobStage::Queued, 0));

        let mut seen = vec![job.progress];
        for stage in [
            JobStage::Parsing,
            JobStage::Chunking,
            JobStage::Embedding,
            JobStage::Indexing,
        ] {
            job.advance(stage).unwrap();
            seen.push(job.progress);
        }
        job.complete(summary()).unwrap();
        seen.push(job.progress);

        assert_eq!(seen, vec![0, 10, 50, 80, 95, 100]);
        assert_eq!(job.stage, JobStage::Completed);
        assert!(job.error.is_none());
        assert!(job.result.is_some());
    }

    #[test]
    fn test_skipping_stages_allowed() {
        let mut job = JobState::new("job-2", "a.pdf");
        job.advance(JobStage::Chunking).unwrap();
        assert_eq!(job.progress, 50);
        job.advance(JobStage::Chunking).unwrap();
        assert_eq!(job.progress, 50);
    }

    #[test]
    fn test_backwards_move_rejected() {
        let mut job = JobState::new("job-3", "a.pdf");
        job.advance(JobStage::Embedding).unwrap();
        let err = job.advance(JobStage::Parsing).unwrap_err();
        assert!(matches!(err, TransitionError::Backwards { from: JobStage::Embedding, to: JobStage::Parsing, .. }));
        assert_eq!(job.progress, 80);
    }

    #[test]
    fn test_advance_cannot_enter_terminal_stage() {
        let mut job = JobState::new("job-4", "a.pdf");
        assert!(job.advance(JobStage::Completed).is_err());
        assert!(job.advance(JobStage::Failed).is_err());
        assert_eq!(job.stage, JobStage::Queued);
    }

    #[test]
    fn test_failure_keeps_progress_and_is_terminal() {
        let mut job = JobState::new("job-5", "a.pdf");
        job.advance(JobStage::Parsing).unwrap();
        job.advance(JobStage::Chunking).unwrap();
        job.fail("Failed to parse 'a.pdf': broken").unwrap();

        assert_eq!(job.stage, JobStage::Failed);
        assert_eq!(job.progress, 50);
        assert!(job.error.as_deref().unwrap().contains("broken"));

        let err = job.advance(JobStage::Embedding).unwrap_err();
        assert!(matches!(err, TransitionError::Terminal { stage: JobStage::Failed, .. }));
        assert!(job.complete(summary()).is_err());
        assert!(job.fail("again").is_err());
    }

    #[test]
    fn test_empty_failure_message_replaced() {
        let mut job = JobState::new("job-6", "a.pdf");
        job.advance(JobStage::Parsing).unwrap();
        job.fail("  ").unwrap();
        assert_eq!(job.error.as_deref(), Some("ingestion failed during parsing"));
    }

    #[test]
    fn test_completed_job_is_frozen() {
        let mut job = JobState::new("job-7", "a.pdf");
        job.complete(summary()).unwrap();
        assert!(job.fail("late").is_err());
        assert!(job.error.is_none());
    }
}

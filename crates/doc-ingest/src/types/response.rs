//! Response types for the HTTP surface and job results

use serde::{Deserialize, Serialize};

use super::document::{BlockType, Chunk};
use crate::processing::{JobStage, JobState};

/// Success envelope shared by every JSON endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Always 0 on success
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_message("success", data)
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: 0,
            message: message.into(),
            data,
        }
    }
}

/// Preview of one chunk in a job result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPreview {
    pub chunk_id: String,
    /// Text truncated to the preview length, with `...` appended
    pub text: String,
    pub tokens: usize,
    pub pages: Vec<u32>,
    pub block_types: Vec<BlockType>,
}

impl ChunkPreview {
    pub fn from_chunk(chunk: &Chunk, max_chars: usize) -> Self {
        let text: String = chunk.text.chars().take(max_chars).collect();
        Self {
            chunk_id: chunk.chunk_id.clone(),
            text: format!("{}...", text),
            tokens: chunk.tokens,
            pages: chunk.pages.clone(),
            block_types: chunk.block_types.clone(),
        }
    }
}

/// Result of a successful ingestion job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub filename: String,
    pub total_pages: u32,
    pub content_hash: String,
    pub chunks_count: usize,
    /// False when the embedding stage failed or was skipped
    pub embedded: bool,
    pub embedding_dim: Option<usize>,
    /// False when the indexing stage failed or was skipped
    pub indexed: bool,
    pub preview: Vec<ChunkPreview>,
}

/// Response after an upload was accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub filename: String,
    pub status: TaskStatus,
}

/// Coarse task status reported to pollers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Started,
    Success,
    Failure,
}

impl From<JobStage> for TaskStatus {
    fn from(stage: JobStage) -> Self {
        match stage {
            JobStage::Queued => Self::Pending,
            JobStage::Parsing | JobStage::Chunking | JobStage::Embedding | JobStage::Indexing => {
                Self::Started
            }
            JobStage::Completed => Self::Success,
            JobStage::Failed => Self::Failure,
        }
    }
}

/// Polling view of one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub stage: JobStage,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&JobState> for TaskResponse {
    fn from(state: &JobState) -> Self {
        Self {
            task_id: state.job_id.clone(),
            status: state.stage.into(),
            stage: state.stage,
            progress: state.progress,
            result: state.result.clone(),
            error: state.error.clone(),
        }
    }
}

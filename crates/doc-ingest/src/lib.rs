//! doc-ingest: PDF ingestion into layout-aware, overlap-linked text chunks
//!
//! A PDF is rendered into positioned text blocks, each block is classified as a
//! heading, list or paragraph, its text is cleaned of page furniture, and the
//! cleaned blocks are folded into length-bounded chunks that share an overlap.
//! Jobs run inline or on a background worker pool and report their stage and
//! progress for polling. Chunks can then be embedded and indexed through a
//! configured LLM provider, and rewritten for a reader profile through the same
//! provider with the result checked by the readability scorer.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod personalize;
pub mod processing;
pub mod providers;
pub mod readability;
pub mod server;
pub mod storage;
pub mod types;

pub use config::IngestConfig;
pub use error::{Error, Result};
pub use ingestion::IngestPipeline;
pub use processing::{IngestJob, IngestRunner, JobQueue, JobStage, JobState};
pub use types::{BlockType, Chunk, CleanBlock, IngestOptions, ParsedDocument};

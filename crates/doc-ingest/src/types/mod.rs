//! Core types for the ingestion pipeline

pub mod document;
pub mod profile;
pub mod request;
pub mod response;

pub use document::{BBox, Block, BlockType, Chunk, CleanBlock, EmbeddedChunk, Page, ParsedDocument};
pub use profile::{ProfileCreate, UserProfile};
pub use request::{IngestOptions, PersonalizeRequest, ReadabilityRequest};
pub use response::{ApiResponse, ChunkPreview, JobSummary, SubmitResponse, TaskResponse, TaskStatus};

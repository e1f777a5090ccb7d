//! Configuration for the ingestion service
//!
//! Values come from `IngestConfig::default()`, an optional TOML file and
//! `DOC_INGEST_*` environment variables, applied in that order.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Layout extraction and cleaning configuration
    pub layout: LayoutConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Job execution configuration
    pub jobs: JobsConfig,
    /// Storage locations
    pub storage: StorageConfig,
}

impl IngestConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Apply `DOC_INGEST_*` overrides using the given variable lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DOC_INGEST_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("DOC_INGEST_PORT") {
            self.server.port = parse_env("DOC_INGEST_PORT", &v)?;
        }
        if let Some(v) = lookup("DOC_INGEST_MAX_UPLOAD_SIZE") {
            self.server.max_upload_size = parse_env("DOC_INGEST_MAX_UPLOAD_SIZE", &v)?;
        }
        if let Some(v) = lookup("DOC_INGEST_HEADING_FONT_THRESHOLD") {
            self.layout.heading_font_threshold = parse_env("DOC_INGEST_HEADING_FONT_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("DOC_INGEST_TARGET_CHUNK_SIZE") {
            self.chunking.target_chunk_size = parse_env("DOC_INGEST_TARGET_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("DOC_INGEST_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_env("DOC_INGEST_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("DOC_INGEST_LLM_PROVIDER") {
            self.llm.provider = v.parse()?;
        }
        if let Some(v) = lookup("DOC_INGEST_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = lookup("DOC_INGEST_LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = lookup("DOC_INGEST_LLM_CHAT_MODEL") {
            self.llm.chat_model = v;
        }
        if let Some(v) = lookup("DOC_INGEST_LLM_EMBED_MODEL") {
            self.llm.embed_model = v;
        }
        if let Some(v) = lookup("DOC_INGEST_JOB_MODE") {
            self.jobs.mode = v.parse()?;
        }
        if let Some(v) = lookup("DOC_INGEST_WORKERS") {
            self.jobs.workers = Some(parse_env("DOC_INGEST_WORKERS", &v)?);
        }
        if let Some(v) = lookup("DOC_INGEST_UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOC_INGEST_DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(v);
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {}: '{}'", key, value)))
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 10MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Layout extraction, classification and cleaning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Blocks whose largest font is at least this size are headings
    pub heading_font_threshold: f32,
    /// Fraction of the page height treated as header (top) and footer (bottom) band
    pub header_footer_margin: f32,
    /// Drop blocks in the header/footer bands before chunking
    pub skip_header_footer: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            heading_font_threshold: 14.0,
            header_footer_margin: 0.1,
            skip_header_footer: true,
        }
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub target_chunk_size: usize,
    /// Overlap carried into the next chunk, in characters
    pub chunk_overlap: usize,
    /// Blocks shorter than this (after cleaning) are dropped as noise
    pub min_block_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chunk_size: 400,
            chunk_overlap: 50,
            min_block_chars: 5,
        }
    }
}

/// Supported LLM vendors
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// Offline provider returning zero vectors
    #[default]
    Placeholder,
    OpenAi,
    SiliconFlow,
    Qwen,
    Ollama,
    Anthropic,
}

impl std::str::FromStr for LlmProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "placeholder" => Ok(Self::Placeholder),
            "openai" => Ok(Self::OpenAi),
            "siliconflow" => Ok(Self::SiliconFlow),
            "qwen" => Ok(Self::Qwen),
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(Error::Config(format!("Unsupported LLM provider: {}", other))),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Vendor to use
    pub provider: LlmProviderKind,
    /// API base URL (empty = vendor default)
    pub base_url: String,
    /// API key (not needed for placeholder/ollama)
    pub api_key: String,
    /// Model used for complete/chat
    pub chat_model: String,
    /// Model used for embeddings
    pub embed_model: String,
    /// Embedding dimensions
    pub embedding_dimensions: usize,
    /// Texts per embedding request
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum output tokens for generation
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::Placeholder,
            base_url: String::new(),
            api_key: String::new(),
            chat_model: "Qwen/Qwen2.5-7B-Instruct".to_string(),
            embed_model: "text-embedding-3-large".to_string(),
            embedding_dimensions: 1536,
            batch_size: 32,
            timeout_secs: 120,
            max_retries: 2,
            temperature: 0.3,
            max_tokens: 8000,
        }
    }
}

impl LlmConfig {
    /// Base URL, falling back to the vendor default
    pub fn resolved_base_url(&self) -> String {
        if !self.base_url.is_empty() {
            return self.base_url.trim_end_matches('/').to_string();
        }
        match self.provider {
            LlmProviderKind::OpenAi => "https://api.openai.com/v1",
            LlmProviderKind::SiliconFlow => "https://api.siliconflow.cn/v1",
            LlmProviderKind::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            LlmProviderKind::Ollama => "http://localhost:11434",
            LlmProviderKind::Anthropic => "https://api.anthropic.com/v1",
            LlmProviderKind::Placeholder => "",
        }
        .to_string()
    }
}

/// How ingestion jobs are executed by default
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    /// Queue on the background worker pool and poll by job id
    #[default]
    Async,
    /// Run within the request, blocking until the job is terminal
    Inline,
}

impl std::str::FromStr for JobMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "async" => Ok(Self::Async),
            "inline" | "sync" => Ok(Self::Inline),
            other => Err(Error::Config(format!("Unknown job mode: {}", other))),
        }
    }
}

/// Job execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Default execution mode
    pub mode: JobMode,
    /// Concurrent jobs on the worker pool (default: CPU count, max 4)
    pub workers: Option<usize>,
    /// Pending jobs the queue accepts before submission waits
    pub queue_capacity: usize,
    /// Seconds a terminal job result stays queryable
    pub result_ttl_secs: u64,
    /// Maximum number of terminal job results kept
    pub result_capacity: usize,
    /// Chunks included in a job result preview
    pub preview_chunks: usize,
    /// Characters of chunk text kept in the preview
    pub preview_chars: usize,
    /// Seconds a single job may run before it is failed
    pub job_timeout_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            mode: JobMode::Async,
            workers: None,
            queue_capacity: 1000,
            result_ttl_secs: 3600,
            result_capacity: 1000,
            preview_chunks: 5,
            preview_chars: 100,
            job_timeout_secs: 600,
        }
    }
}

impl JobsConfig {
    /// Worker count, auto-detected from the CPU count when unset
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| num_cpus::get().min(4)).max(1)
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory where uploaded documents are saved
    pub upload_dir: PathBuf,
    /// SQLite database for profiles
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doc-ingest");

        Self {
            upload_dir: data_dir.join("uploads"),
            database_path: data_dir.join("profiles.db"),
        }
    }
}

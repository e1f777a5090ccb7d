//! Application state for the ingestion server

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::ingestion::IngestPipeline;
use crate::processing::{InMemoryResultStore, IngestRunner, IngestWorker, JobQueue};
use crate::providers::{build_provider, ChunkEmbedder, ChunkIndex, InMemoryChunkIndex, LlmProvider};
use crate::personalize::Personalizer;
use crate::readability::ReadabilityScorer;
use crate::storage::ProfileStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: IngestConfig,
    /// LLM provider used for embeddings, rewrites and health checks
    provider: Arc<dyn LlmProvider>,
    /// Embedded chunks of every ingested document
    index: Arc<dyn ChunkIndex>,
    /// Executes ingestion jobs
    runner: Arc<IngestRunner>,
    /// Job queue for async processing
    job_queue: Arc<JobQueue>,
    /// Reader profiles
    profiles: ProfileStore,
    /// Profile-driven rewrites, also owns the readability scorer
    personalizer: Personalizer,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create new application state and start the worker pool
    ///
    /// Must be called from within a tokio runtime.
    pub async fn new(config: IngestConfig) -> Result<Self> {
        tracing::info!("Initializing ingestion service state...");

        let provider = build_provider(&config.llm)?;
        let profiles = ProfileStore::open(&config.storage.database_path)?;

        Self::with_components(config, provider, Arc::new(InMemoryChunkIndex::new()), profiles).await
    }

    /// Assemble state from prebuilt collaborators
    pub async fn with_components(
        config: IngestConfig,
        provider: Arc<dyn LlmProvider>,
        index: Arc<dyn ChunkIndex>,
        profiles: ProfileStore,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&config.storage.upload_dir)
            .await
            .map_err(|e| {
                Error::Config(format!(
                    "Failed to create upload directory {}: {}",
                    config.storage.upload_dir.display(),
                    e
                ))
            })?;

        let embedder = Arc::new(ChunkEmbedder::new(provider.clone(), config.llm.batch_size));
        let runner = Arc::new(IngestRunner::new(
            IngestPipeline::from_config(&config),
            embedder,
            index.clone(),
            config.jobs.clone(),
        ));

        let results = Arc::new(InMemoryResultStore::new(
            config.jobs.result_capacity,
            std::time::Duration::from_secs(config.jobs.result_ttl_secs),
        ));
        let (job_queue, receiver) = JobQueue::new(
            config.jobs.worker_count(),
            config.jobs.queue_capacity,
            results,
        );
        let job_queue = Arc::new(job_queue);

        tokio::spawn(IngestWorker::new(runner.clone(), job_queue.clone()).run(receiver));

        tracing::info!(
            "Ingestion ready: {} workers, default mode {:?}, index {}",
            job_queue.worker_count(),
            config.jobs.mode,
            index.name()
        );

        let personalizer = Personalizer::new(provider.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                provider,
                index,
                runner,
                job_queue,
                profiles,
                personalizer,
                ready: RwLock::new(true),
            }),
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.provider
    }

    pub fn index(&self) -> &Arc<dyn ChunkIndex> {
        &self.inner.index
    }

    pub fn runner(&self) -> &Arc<IngestRunner> {
        &self.inner.runner
    }

    pub fn job_queue(&self) -> &Arc<JobQueue> {
        &self.inner.job_queue
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.inner.profiles
    }

    pub fn readability(&self) -> &ReadabilityScorer {
        self.inner.personalizer.scorer()
    }

    pub fn personalizer(&self) -> &Personalizer {
        &self.inner.personalizer
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }

    /// Save an upload under a collision-free name
    pub async fn save_upload(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let name = std::path::Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        let path = self
            .inner
            .config
            .storage
            .upload_dir
            .join(format!("{}_{}", Uuid::new_v4(), name));

        tokio::fs::write(&path, data).await?;
        tracing::debug!("Saved upload {} to {}", filename, path.display());
        Ok(path)
    }

    /// Remove a saved upload, logging failures
    pub async fn discard_upload(&self, path: &std::path::Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!("Failed to remove upload {}: {}", path.display(), e);
        }
    }
}

//! Job execution and the background worker pool

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::JobsConfig;
use crate::error::{Error, Result};
use crate::ingestion::IngestPipeline;
use crate::providers::{ChunkEmbedder, ChunkIndex};
use crate::types::{ChunkPreview, JobSummary, ParsedDocument};

use super::job_queue::{IngestJob, JobObserver, JobQueue, JobSource};
use super::state::{JobStage, JobState};

/// Runs one ingestion job through every stage
pub struct IngestRunner {
    pipeline: IngestPipeline,
    embedder: Arc<ChunkEmbedder>,
    index: Arc<dyn ChunkIndex>,
    jobs: JobsConfig,
}

impl IngestRunner {
    pub fn new(
        pipeline: IngestPipeline,
        embedder: Arc<ChunkEmbedder>,
        index: Arc<dyn ChunkIndex>,
        jobs: JobsConfig,
    ) -> Self {
        Self {
            pipeline,
            embedder,
            index,
            jobs,
        }
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    /// Run a job to a terminal stage, publishing every transition
    ///
    /// Errors never escape: they end the job in `failed`.
    pub async fn run(
        &self,
        job: &IngestJob,
        mut state: JobState,
        observer: &dyn JobObserver,
    ) -> JobState {
        if state.is_terminal() {
            tracing::warn!("Job {} is already {}", job.job_id, state.stage);
            return state;
        }

        let start_time = Instant::now();
        let limit = Duration::from_secs(self.jobs.job_timeout_secs);
        tracing::info!("Starting job {} for {}", job.job_id, job.filename);

        let outcome = match timeout(limit, self.execute(job, &mut state, observer)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    "TIMEOUT processing '{}' after {:.1}s (limit: {}s)",
                    job.filename,
                    start_time.elapsed().as_secs_f64(),
                    limit.as_secs()
                );
                Err(Error::internal(format!(
                    "Ingestion timed out after {}s",
                    limit.as_secs()
                )))
            }
        };

        let finished = match outcome {
            Ok(summary) => {
                let chunks = summary.chunks_count;
                state.complete(summary).map(|_| {
                    tracing::info!(
                        "Job {} completed: {} chunks in {:.1}s",
                        job.job_id,
                        chunks,
                        start_time.elapsed().as_secs_f64()
                    );
                })
            }
            Err(e) => {
                tracing::error!("Job {} failed during {}: {}", job.job_id, state.stage, e);
                state.fail(e.to_string())
            }
        };
        if let Err(e) = finished {
            tracing::error!("Could not finish job {}: {}", job.job_id, e);
        }

        observer.publish(&state);
        state
    }

    /// Run a job on its own task
    ///
    /// The job still reaches a terminal stage when the caller awaiting the
    /// handle goes away.
    pub fn spawn(
        self: Arc<Self>,
        job: IngestJob,
        state: JobState,
        observer: Arc<dyn JobObserver>,
    ) -> JoinHandle<JobState> {
        tokio::spawn(async move { self.run(&job, state, observer.as_ref()).await })
    }

    async fn execute(
        &self,
        job: &IngestJob,
        state: &mut JobState,
        observer: &dyn JobObserver,
    ) -> Result<JobSummary> {
        job.options.validate()?;
        let pipeline = self.pipeline.with_options(&job.options);

        enter(state, JobStage::Parsing, observer)?;
        let doc = {
            let pipeline = pipeline.clone();
            let source = job.source.clone();
            let filename = job.filename.clone();
            tokio::task::spawn_blocking(move || parse_source(&pipeline, &filename, source))
                .await
                .map_err(|e| Error::internal(format!("Parsing task failed: {}", e)))??
        };

        enter(state, JobStage::Chunking, observer)?;
        let (doc, chunks) = tokio::task::spawn_blocking(move || {
            let chunks = pipeline.chunk(&pipeline.clean(&doc));
            (doc, chunks)
        })
        .await
        .map_err(|e| Error::internal(format!("Chunking task failed: {}", e)))?;

        tracing::info!(
            "[{}] {} pages, {} blocks, {} chunks",
            job.filename,
            doc.total_pages,
            doc.block_count(),
            chunks.len()
        );

        enter(state, JobStage::Embedding, observer)?;
        let embedded = if job.options.skip_embedding {
            tracing::info!("[{}] Embedding skipped", job.filename);
            None
        } else {
            match self.embedder.embed_chunks(&chunks).await {
                Ok(embedded) => Some(embedded),
                Err(e) => {
                    tracing::warn!(
                        "[{}] Embedding with {} failed, keeping chunks: {}",
                        job.filename,
                        self.embedder.provider_name(),
                        e
                    );
                    None
                }
            }
        };

        enter(state, JobStage::Indexing, observer)?;
        let indexed = match &embedded {
            Some(embedded) => match self.index.index(&job.filename, embedded).await {
                Ok(count) => {
                    tracing::info!(
                        "[{}] Indexed {} chunks in {}",
                        job.filename,
                        count,
                        self.index.name()
                    );
                    true
                }
                Err(e) => {
                    tracing::warn!("[{}] Indexing failed: {}", job.filename, e);
                    false
                }
            },
            None => false,
        };

        Ok(JobSummary {
            filename: job.filename.clone(),
            total_pages: doc.total_pages,
            content_hash: doc.content_hash,
            chunks_count: chunks.len(),
            embedded: embedded.is_some(),
            embedding_dim: embedded
                .as_ref()
                .and_then(|e| e.first())
                .map(|c| c.embedding_dim),
            indexed,
            preview: chunks
                .iter()
                .take(self.jobs.preview_chunks)
                .map(|c| ChunkPreview::from_chunk(c, self.jobs.preview_chars))
                .collect(),
        })
    }
}

fn enter(state: &mut JobState, stage: JobStage, observer: &dyn JobObserver) -> Result<()> {
    state.advance(stage)?;
    tracing::info!("Job {} {} ({}%)", state.job_id, stage, state.progress);
    observer.publish(state);
    Ok(())
}

fn parse_source(pipeline: &IngestPipeline, filename: &str, source: JobSource) -> Result<ParsedDocument> {
    match source {
        JobSource::Bytes(data) => pipeline.parse_bytes(filename, &data),
        JobSource::Path(path) => {
            // Saved uploads carry a generated name; report the original one
            let mut doc = pipeline.parse_path(&path)?;
            doc.filename = filename.to_string();
            Ok(doc)
        }
    }
}

/// Worker pool draining the job queue
pub struct IngestWorker {
    runner: Arc<IngestRunner>,
    queue: Arc<JobQueue>,
    worker_count: usize,
}

impl IngestWorker {
    pub fn new(runner: Arc<IngestRunner>, queue: Arc<JobQueue>) -> Self {
        let worker_count = queue.worker_count().max(1);
        Self {
            runner,
            queue,
            worker_count,
        }
    }

    /// Start processing jobs from the queue
    pub async fn run(self, mut receiver: mpsc::Receiver<IngestJob>) {
        tracing::info!("Ingest worker started: {} parallel jobs", self.worker_count);

        let semaphore = Arc::new(Semaphore::new(self.worker_count));

        while let Some(job) = receiver.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let runner = self.runner.clone();
            let queue = self.queue.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let state = queue
                    .status(&job.job_id)
                    .unwrap_or_else(|| JobState::new(job.job_id.clone(), job.filename.clone()));
                runner.run(&job, state, queue.as_ref()).await;
            });
        }

        tracing::info!("Ingest worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, LayoutConfig};
    use crate::ingestion::{LayoutExtractor, RenderBackend, RenderedBlock, RenderedPage, TextLine, TextSpan};
    use crate::processing::InMemoryResultStore;
    use crate::providers::{ChatMessage, InMemoryChunkIndex, LlmProvider, PlaceholderProvider};
    use crate::types::{BBox, IngestOptions};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct FixedBackend;

    impl RenderBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn render(&self, _data: &[u8]) -> Result<Vec<RenderedPage>> {
            let block = |y: f32, text: &str, size: f32| RenderedBlock::Text {
                bbox: BBox::new(72.0, y, 520.0, y + 20.0),
                lines: vec![TextLine::new(vec![TextSpan::new(text, size)])],
            };
            Ok(vec![RenderedPage {
                page_num: 1,
                width: 595.0,
                height: 842.0,
                blocks: vec![
                    block(120.0, "第一章 恐龙", 18.0),
                    block(200.0, &"恐龙是生活在中生代的爬行动物。".repeat(30), 12.0),
                    block(400.0, "• 霸王龙是肉食恐龙", 12.0),
                ],
            }])
        }
    }

    struct BrokenBackend;

    impl RenderBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }

        fn render(&self, _data: &[u8]) -> Result<Vec<RenderedPage>> {
            Err(Error::file_parse("document.pdf", "Failed to load PDF: invalid header"))
        }
    }

    /// Provider whose embeddings fail or hang
    struct UnreliableProvider {
        hang: bool,
    }

    #[async_trait]
    impl LlmProvider for UnreliableProvider {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok(String::new())
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Err(Error::embedding("connection refused"))
        }

        fn dimensions(&self) -> usize {
            8
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "unreliable"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<JobState>>);

    impl JobObserver for Recorder {
        fn publish(&self, state: &JobState) {
            self.0.lock().push(state.clone());
        }
    }

    impl Recorder {
        fn progress(&self) -> Vec<u8> {
            self.0.lock().iter().map(|s| s.progress).collect()
        }
    }

    fn runner_with(
        backend: Arc<dyn RenderBackend>,
        provider: Arc<dyn LlmProvider>,
        index: Arc<InMemoryChunkIndex>,
        jobs: JobsConfig,
    ) -> IngestRunner {
        IngestRunner::new(
            IngestPipeline::new(
                LayoutExtractor::new(backend),
                LayoutConfig::default(),
                ChunkingConfig::default(),
            ),
            Arc::new(ChunkEmbedder::new(provider, 32)),
            index,
            jobs,
        )
    }

    fn job(options: IngestOptions) -> IngestJob {
        IngestJob::queued("dino.pdf", JobSource::Bytes(b"%PDF-1.5".to_vec()), options)
    }

    async fn run(runner: &IngestRunner, job: &IngestJob, recorder: &Recorder) -> JobState {
        let state = JobState::new(job.job_id.clone(), job.filename.clone());
        runner.run(job, state, recorder).await
    }

    #[tokio::test]
    async fn test_successful_job() {
        let index = Arc::new(InMemoryChunkIndex::new());
        let runner = runner_with(
            Arc::new(FixedBackend),
            Arc::new(PlaceholderProvider::new(16)),
            index.clone(),
            JobsConfig::default(),
        );
        let recorder = Recorder::default();
        let job = job(IngestOptions::default());

        let state = run(&runner, &job, &recorder).await;

        assert_eq!(state.stage, JobStage::Completed);
        assert_eq!(recorder.progress(), vec![10, 50, 80, 95, 100]);
        assert!(state.error.is_none());

        let summary = state.result.unwrap();
        assert_eq!(summary.filename, "dino.pdf");
        assert_eq!(summary.total_pages, 1);
        assert_eq!(summary.chunks_count, 3);
        assert!(summary.embedded && summary.indexed);
        assert_eq!(summary.embedding_dim, Some(16));
        assert_eq!(summary.preview.len(), 3);
        assert!(summary.preview[0].text.ends_with("..."));
        assert_eq!(index.document("dino.pdf").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_parse_failure_fails_job() {
        let runner = runner_with(
            Arc::new(BrokenBackend),
            Arc::new(PlaceholderProvider::default()),
            Arc::new(InMemoryChunkIndex::new()),
            JobsConfig::default(),
        );
        let recorder = Recorder::default();

        let state = run(&runner, &job(IngestOptions::default()), &recorder).await;

        assert_eq!(state.stage, JobStage::Failed);
        assert_eq!(state.progress, 10);
        let error = state.error.unwrap();
        assert!(error.contains("dino.pdf"));
        assert!(error.contains("invalid header"));
        assert!(state.result.is_none());
        assert_eq!(recorder.0.lock().last().unwrap().stage, JobStage::Failed);
    }

    #[tokio::test]
    async fn test_invalid_options_fail_job() {
        let runner = runner_with(
            Arc::new(FixedBackend),
            Arc::new(PlaceholderProvider::default()),
            Arc::new(InMemoryChunkIndex::new()),
            JobsConfig::default(),
        );
        let recorder = Recorder::default();
        let options = IngestOptions::default().with_target_chunk_size(0);

        let state = run(&runner, &job(options), &recorder).await;

        assert_eq!(state.stage, JobStage::Failed);
        assert_eq!(state.progress, 0);
        assert!(state.error.unwrap().contains("target_chunk_size"));
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_chunks() {
        let index = Arc::new(InMemoryChunkIndex::new());
        let runner = runner_with(
            Arc::new(FixedBackend),
            Arc::new(UnreliableProvider { hang: false }),
            index.clone(),
            JobsConfig::default(),
        );
        let recorder = Recorder::default();

        let state = run(&runner, &job(IngestOptions::default()), &recorder).await;

        assert_eq!(state.stage, JobStage::Completed);
        let summary = state.result.unwrap();
        assert_eq!(summary.chunks_count, 3);
        assert!(!summary.embedded);
        assert!(!summary.indexed);
        assert_eq!(summary.embedding_dim, None);
        assert!(index.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_skip_embedding() {
        let runner = runner_with(
            Arc::new(FixedBackend),
            Arc::new(PlaceholderProvider::default()),
            Arc::new(InMemoryChunkIndex::new()),
            JobsConfig::default(),
        );
        let recorder = Recorder::default();
        let options = IngestOptions {
            skip_embedding: true,
            ..IngestOptions::default()
        };

        let state = run(&runner, &job(options), &recorder).await;
        let summary = state.result.unwrap();
        assert!(!summary.embedded);
        assert_eq!(recorder.progress(), vec![10, 50, 80, 95, 100]);
    }

    #[tokio::test]
    async fn test_timeout_fails_job() {
        let runner = runner_with(
            Arc::new(FixedBackend),
            Arc::new(UnreliableProvider { hang: true }),
            Arc::new(InMemoryChunkIndex::new()),
            JobsConfig {
                job_timeout_secs: 1,
                ..JobsConfig::default()
            },
        );
        let recorder = Recorder::default();

        let state = run(&runner, &job(IngestOptions::default()), &recorder).await;

        assert_eq!(state.stage, JobStage::Failed);
        assert_eq!(state.progress, 80);
        assert!(state.error.unwrap().contains("timed out after 1s"));
    }

    #[tokio::test]
    async fn test_spawned_job_finishes_after_caller_gives_up() {
        let runner = Arc::new(runner_with(
            Arc::new(FixedBackend),
            Arc::new(UnreliableProvider { hang: true }),
            Arc::new(InMemoryChunkIndex::new()),
            JobsConfig {
                job_timeout_secs: 1,
                ..JobsConfig::default()
            },
        ));
        let (queue, _receiver) = JobQueue::new(1, 4, Arc::new(InMemoryResultStore::default()));
        let queue = Arc::new(queue);
        let job = IngestJob::inline(
            "dino.pdf",
            JobSource::Bytes(b"%PDF-1.5".to_vec()),
            IngestOptions::default(),
        );
        let job_id = job.job_id.clone();
        let initial = queue.register(&job);

        let handle = runner.spawn(job, initial, queue.clone());
        assert!(timeout(Duration::from_millis(100), handle).await.is_err());

        let mut state = queue.status(&job_id).unwrap();
        for _ in 0..100 {
            if state.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
            state = queue.status(&job_id).unwrap();
        }

        assert_eq!(state.stage, JobStage::Failed);
        assert_eq!(state.progress, 80);
        assert!(state.error.unwrap().contains("timed out"));
        let stats = queue.stats();
        assert_eq!((stats.active_jobs, stats.failed), (0, 1));
    }

    #[tokio::test]
    async fn test_terminal_state_is_not_rerun() {
        let runner = runner_with(
            Arc::new(FixedBackend),
            Arc::new(PlaceholderProvider::default()),
            Arc::new(InMemoryChunkIndex::new()),
            JobsConfig::default(),
        );
        let recorder = Recorder::default();
        let job = job(IngestOptions::default());
        let mut state = JobState::new(job.job_id.clone(), job.filename.clone());
        state.fail("cancelled upstream").unwrap();

        let state = runner.run(&job, state, &recorder).await;
        assert_eq!(state.error.as_deref(), Some("cancelled upstream"));
        assert!(recorder.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_worker_pool_drains_queue() {
        let runner = Arc::new(runner_with(
            Arc::new(FixedBackend),
            Arc::new(PlaceholderProvider::new(4)),
            Arc::new(InMemoryChunkIndex::new()),
            JobsConfig::default(),
        ));
        let (queue, receiver) = JobQueue::new(2, 16, Arc::new(InMemoryResultStore::default()));
        let queue = Arc::new(queue);
        tokio::spawn(IngestWorker::new(runner, queue.clone()).run(receiver));

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(queue.submit(job(IngestOptions::default())).await.unwrap());
        }

        for _ in 0..200 {
            if ids
                .iter()
                .all(|id| queue.status(id).map(|s| s.is_terminal()).unwrap_or(false))
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        for id in &ids {
            let state = queue.status(id).unwrap();
            assert_eq!(state.stage, JobStage::Completed);
            assert_eq!(state.progress, 100);
        }
        let stats = queue.stats();
        assert_eq!((stats.completed, stats.active_jobs), (3, 0));
    }
}

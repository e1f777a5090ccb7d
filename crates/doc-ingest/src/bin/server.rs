//! Ingestion server binary
//!
//! Run with: cargo run -p doc-ingest --bin doc-ingest-server -- --config doc-ingest.toml

use std::path::PathBuf;

use clap::Parser;
use doc_ingest::{config::IngestConfig, server::IngestServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "doc-ingest-server", version, about = "PDF ingestion service")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_ingest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = IngestConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - LLM provider: {:?}", config.llm.provider);
    tracing::info!("  - Heading font threshold: {}", config.layout.heading_font_threshold);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.target_chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Job mode: {:?}, workers: {}", config.jobs.mode, config.jobs.worker_count());
    tracing::info!("  - Uploads: {}", config.storage.upload_dir.display());

    let server = IngestServer::new(config).await?;

    let provider = server.state().provider();
    match provider.health_check().await {
        Ok(true) => tracing::info!("LLM provider {} is reachable", provider.name()),
        _ => tracing::warn!(
            "LLM provider {} is not reachable, embedding will be skipped until it is",
            provider.name()
        ),
    }

    println!("\nServer starting on http://{}", server.address());
    println!("  POST /ingest/pdf            - Upload a PDF");
    println!("  GET  /ingest/tasks/:task_id - Poll a task");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}

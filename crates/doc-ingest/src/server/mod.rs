//! HTTP server for the ingestion service

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Ingestion HTTP server
pub struct IngestServer {
    config: IngestConfig,
    state: AppState,
}

impl IngestServer {
    /// Create a new server and start its worker pool
    pub async fn new(config: IngestConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = build_router(self.state.clone());

        tracing::info!("Starting ingestion server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Build the router with all routes
pub fn build_router(state: AppState) -> Router {
    let server = state.config().server.clone();

    let router = Router::new()
        .route("/", get(service_info))
        .route("/healthz", get(health_check))
        .route("/readyz", get(readiness))
        .merge(routes::api_routes(server.max_upload_size))
        .with_state(state)
        // Middleware layers (applied bottom to top)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if server.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Service info endpoint
async fn service_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "doc-ingest",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "PDF ingestion into layout-aware, overlapping text chunks",
        "provider": state.provider().name(),
        "default_mode": state.config().jobs.mode,
        "endpoints": {
            "POST /ingest/pdf": "Upload a PDF (query mode=inline|async)",
            "GET /ingest/tasks": "List live tasks and queue stats",
            "GET /ingest/tasks/:task_id": "Poll a task",
            "POST /profiles": "Create or update a reader profile",
            "GET /profiles/:user_id": "Get a reader profile",
            "DELETE /profiles/:user_id": "Delete a reader profile",
            "POST /readability": "Score a text for a target grade"
        }
    }))
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness check endpoint
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let provider_ok = state.provider().health_check().await.unwrap_or(false);

    if state.is_ready() && provider_ok {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        tracing::warn!("Not ready: provider {} healthy = {}", state.provider().name(), provider_ok);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "provider": provider_ok })),
        )
    }
}

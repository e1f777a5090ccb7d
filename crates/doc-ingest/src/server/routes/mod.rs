//! API routes for the ingestion server

pub mod ingest;
pub mod personalize;
pub mod profiles;
pub mod readability;
pub mod tasks;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::server::state::AppState;

/// Room for multipart framing and the options field on top of the file limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    let uploads = Router::new()
        .route("/ingest/pdf", post(ingest::ingest_pdf))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            max_upload_size.saturating_add(MULTIPART_OVERHEAD),
        ));

    Router::new()
        .merge(uploads)
        // Task polling
        .route("/ingest/tasks", get(tasks::list_tasks))
        .route("/ingest/tasks/:task_id", get(tasks::get_task))
        // Reader profiles
        .route("/profiles", post(profiles::upsert_profile))
        .route(
            "/profiles/:user_id",
            get(profiles::get_profile).delete(profiles::delete_profile),
        )
        .route("/readability", post(readability::analyze))
        .route("/personalize", post(personalize::personalize))
}

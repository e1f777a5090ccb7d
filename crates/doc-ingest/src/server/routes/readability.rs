use axum::{extract::State, Json};

use crate::error::Result;
use crate::readability::ReadabilityReport;
use crate::server::state::AppState;
use crate::types::{ApiResponse, ReadabilityRequest};

/// POST /readability - Score a text against a target grade
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<ReadabilityRequest>,
) -> Result<Json<ApiResponse<ReadabilityReport>>> {
    request.validate()?;
    let report = state.readability().analyze(&request.text, request.target_grade);
    Ok(Json(ApiResponse::ok(report)))
}

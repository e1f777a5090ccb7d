use axum::{extract::State, Json};

use crate::error::{Error, Result};
use crate::personalize::PersonalizedText;
use crate::server::state::AppState;
use crate::types::{ApiResponse, PersonalizeRequest};

/// POST /personalize - Rewrite a text or an indexed chunk for a reader
pub async fn personalize(
    State(state): State<AppState>,
    Json(request): Json<PersonalizeRequest>,
) -> Result<Json<ApiResponse<PersonalizedText>>> {
    request.validate()?;

    let profile = state
        .profiles()
        .get(&request.user_id)?
        .ok_or_else(|| Error::NotFound(format!("Profile {} not found", request.user_id)))?;

    let text = match (request.text, request.filename, request.chunk_id) {
        (Some(text), _, _) => text,
        (None, Some(filename), Some(chunk_id)) => {
            state
                .index()
                .chunk(&filename, &chunk_id)
                .await?
                .ok_or_else(|| {
                    Error::NotFound(format!("Chunk {} of {} not found", chunk_id, filename))
                })?
                .text
        }
        _ => return Err(Error::validation("provide either text or both filename and chunk_id")),
    };

    let result = state
        .personalizer()
        .personalize(&profile, &text, &request.must_keep_terms)
        .await?;

    Ok(Json(ApiResponse::with_message("Text personalized", result)))
}

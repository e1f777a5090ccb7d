//! Reader profile endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::storage::UpsertOutcome;
use crate::types::{ApiResponse, ProfileCreate, UserProfile};

/// POST /profiles - Create or update a profile
pub async fn upsert_profile(
    State(state): State<AppState>,
    Json(request): Json<ProfileCreate>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    let (profile, outcome) = state.profiles().upsert(&request)?;

    let message = match outcome {
        UpsertOutcome::Created => "Profile created",
        UpsertOutcome::Updated => "Profile updated",
    };
    Ok(Json(ApiResponse::with_message(message, profile)))
}

/// GET /profiles/:user_id
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    let profile = state
        .profiles()
        .get(&user_id)?
        .ok_or_else(|| Error::NotFound(format!("Profile {} not found", user_id)))?;

    Ok(Json(ApiResponse::ok(profile)))
}

/// DELETE /profiles/:user_id
pub async fn delete_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Value>>> {
    if !state.profiles().delete(&user_id)? {
        return Err(Error::NotFound(format!("Profile {} not found", user_id)));
    }

    Ok(Json(ApiResponse::with_message(
        "Profile deleted",
        json!({ "user_id": user_id }),
    )))
}

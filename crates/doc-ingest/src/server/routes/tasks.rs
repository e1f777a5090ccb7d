//! Task status endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::processing::QueueStats;
use crate::server::state::AppState;
use crate::types::{ApiResponse, TaskResponse};

/// Live tasks and queue statistics
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub stats: QueueStats,
}

/// GET /ingest/tasks/:task_id - Poll one task
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ApiResponse<TaskResponse>>> {
    let job = state
        .job_queue()
        .status(&task_id)
        .ok_or_else(|| Error::NotFound(format!("Task {} not found", task_id)))?;

    Ok(Json(ApiResponse::ok(TaskResponse::from(&job))))
}

/// GET /ingest/tasks - List live tasks
pub async fn list_tasks(State(state): State<AppState>) -> Json<ApiResponse<TaskListResponse>> {
    let queue = state.job_queue();
    let tasks = queue.list_jobs().iter().map(TaskResponse::from).collect();

    Json(ApiResponse::ok(TaskListResponse {
        tasks,
        stats: queue.stats(),
    }))
}

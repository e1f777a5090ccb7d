//! PDF upload endpoint

use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;

use crate::config::JobMode;
use crate::error::{Error, Result};
use crate::ingestion::is_pdf;
use crate::processing::{IngestJob, JobSource};
use crate::server::state::AppState;
use crate::types::{ApiResponse, IngestOptions, SubmitResponse, TaskStatus};

/// Query parameters of `POST /ingest/pdf`
#[derive(Debug, Default, Deserialize)]
pub struct IngestQuery {
    /// `inline` or `async`; the configured default when absent
    pub mode: Option<String>,
}

/// POST /ingest/pdf - Upload a PDF for ingestion
pub async fn ingest_pdf(
    State(state): State<AppState>,
    Query(query): Query<IngestQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<SubmitResponse>>> {
    let limit = state.config().server.max_upload_size;
    let mode = match query.mode.as_deref() {
        Some(mode) => mode
            .parse::<JobMode>()
            .map_err(|_| Error::validation(format!("Unknown mode '{}', expected inline or async", mode)))?,
        None => state.config().jobs.mode,
    };

    let mut upload: Option<(String, Bytes)> = None;
    let mut options = IngestOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        match field.name() {
            Some("options") => {
                let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                options = serde_json::from_slice(&data)
                    .map_err(|e| Error::validation(format!("Invalid options: {}", e)))?;
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                upload = Some((filename, data));
            }
            _ => continue,
        }
    }

    let (filename, data) = upload.ok_or_else(|| Error::validation("Missing 'file' field"))?;
    if !is_pdf(&filename) {
        return Err(Error::UnsupportedFileType(format!(
            "{} (only .pdf files are accepted)",
            filename
        )));
    }
    if data.len() > limit {
        return Err(Error::PayloadTooLarge { limit });
    }
    options.validate()?;

    tracing::info!("Received {} ({} bytes, mode {:?})", filename, data.len(), mode);
    let path = state.save_upload(&filename, &data).await?;

    match mode {
        JobMode::Async => {
            let job = IngestJob::queued(filename.clone(), JobSource::Path(path.clone()), options);
            match state.job_queue().submit(job).await {
                Ok(task_id) => Ok(Json(ApiResponse::with_message(
                    "Task submitted",
                    SubmitResponse {
                        task_id,
                        filename,
                        status: TaskStatus::Pending,
                    },
                ))),
                Err(e) => {
                    state.discard_upload(&path).await;
                    Err(e)
                }
            }
        }
        JobMode::Inline => {
            let job = IngestJob::inline(filename.clone(), JobSource::Path(path), options);
            let queue = state.job_queue().clone();
            let initial = queue.register(&job);
            let finished = state
                .runner()
                .clone()
                .spawn(job, initial, queue)
                .await
                .map_err(|e| Error::internal(format!("Inline job did not finish: {}", e)))?;

            Ok(Json(ApiResponse::with_message(
                "Task finished",
                SubmitResponse {
                    task_id: finished.job_id,
                    filename,
                    status: finished.stage.into(),
                },
            )))
        }
    }
}

fn multipart_error(err: MultipartError, limit: usize) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { limit }
    } else {
        Error::validation(format!("Invalid multipart body: {}", err))
    }
}

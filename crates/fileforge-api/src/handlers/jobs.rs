use axum::{
    Json,
    extract::{Path, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use fileforge_common::error::ForgeError;
use fileforge_jobs::ArchiveStore;
use fileforge_notify::EventPayload;
use serde::Serialize;

use crate::{
    error::ApiError,
    handlers::tools::{Tool, attachment},
    state::AppState,
};

/// Serves a finished archive. Repeated downloads return the same bytes
/// until the retention sweep removes the file.
pub async fn download<T: Tool>(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let utility = T::select(&state.tools).utility();
    let bytes = state.runner.archives().read(utility, &job_id).await?;
    let name = ArchiveStore::archive_name(utility, &job_id);
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/zip".to_string()),
            (CONTENT_DISPOSITION, attachment(&name)),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastEvent {
    pub event: String,
    pub data: EventPayload,
    pub emitted_at: DateTime<Utc>,
}

pub async fn last_event(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<LastEvent>, ApiError> {
    let event = state
        .hub
        .last_event(&job_id)
        .ok_or_else(|| ForgeError::JobNotFound(job_id.clone()))?;
    Ok(Json(LastEvent {
        event: event.name(),
        data: event.payload,
        emitted_at: event.emitted_at,
    }))
}

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use cirrus_core::AppError;
use cirrus_transfer::{BatchOutcome, UploadEventStream};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::UserId;
use crate::error::{ErrorResponse, HttpAppError};
use crate::multipart::forward_multipart;
use crate::state::AppState;

const EVENT_CHANNEL_CAPACITY: usize = 4;

#[derive(Debug, Serialize, ToSchema)]
pub struct FolderUploadItem {
    pub index: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FolderUploadResponse {
    pub parent: String,
    pub declared_total: usize,
    pub succeeded: usize,
    pub timed_out: bool,
    pub items: Vec<FolderUploadItem>,
}

impl From<BatchOutcome> for FolderUploadResponse {
    fn from(outcome: BatchOutcome) -> Self {
        let succeeded = outcome.succeeded();
        FolderUploadResponse {
            parent: outcome.parent,
            declared_total: outcome.declared_total,
            succeeded,
            timed_out: outcome.timed_out,
            items: outcome
                .items
                .into_values()
                .map(|item| FolderUploadItem {
                    index: item.index,
                    name: item.name,
                    file_id: item.file_id,
                    error: item.error,
                })
                .collect(),
        }
    }
}

/// Upload a folder batch.
///
/// The body declares `total-files` and a `file-data` descriptor ahead of each
/// part. Parts are ingested concurrently with preview decisioning; per-part
/// failures are reported in the response rather than failing the batch. A
/// stalled batch resolves with partial results and `timed_out` set.
#[utoipa::path(
    post,
    path = "/api/v1/files/folder",
    tag = "files",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Batch resolved", body = FolderUploadResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Missing or invalid identity", body = ErrorResponse),
        (status = 409, description = "Batch timed out before any part arrived", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(user_id = %user.0, operation = "upload_folder"))]
pub async fn upload_folder(
    State(state): State<Arc<AppState>>,
    user: UserId,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FolderUploadResponse>), HttpAppError> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let events: UploadEventStream = Box::pin(ReceiverStream::new(rx));

    let (forwarded, resolved) = tokio::join!(
        forward_multipart(multipart, tx),
        state.folders.ingest_batch(user.0, events),
    );

    let outcome = resolved?;
    // A transport error after the batch resolved is already reflected in the
    // per-item results.
    if !outcome.timed_out {
        forwarded?;
    }

    // A timeout with per-part results still reports them; a timeout before
    // any part arrived is a conflict between the declaration and the body.
    if outcome.timed_out && outcome.items.is_empty() {
        return Err(AppError::BatchTimeout {
            completed: 0,
            declared: outcome.declared_total,
        }
        .into());
    }

    Ok((StatusCode::OK, Json(outcome.into())))
}

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use cirrus_core::models::FileRecord;
use cirrus_transfer::UploadEventStream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::auth::UserId;
use crate::error::{ErrorResponse, HttpAppError};
use crate::multipart::forward_multipart;
use crate::state::AppState;

const EVENT_CHANNEL_CAPACITY: usize = 4;

/// Upload a single file.
///
/// Scalar fields (`parent`, `size`) must precede the file part. The committed
/// record carries the measured size, not the declared one. No preview is
/// attached on this path.
#[utoipa::path(
    post,
    path = "/api/v1/files",
    tag = "files",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File uploaded", body = FileRecord),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Missing or invalid identity", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(user_id = %user.0, operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    user: UserId,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FileRecord>), HttpAppError> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let events: UploadEventStream = Box::pin(ReceiverStream::new(rx));

    let pipeline = state.pipeline.clone();
    let (forwarded, uploaded) = tokio::join!(
        forward_multipart(multipart, tx),
        pipeline.ingest_single(user.0, events),
    );

    let upload = uploaded?;
    forwarded?;

    Ok((StatusCode::CREATED, Json(upload.file)))
}

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use cirrus_core::AppError;
use cirrus_transfer::RangeRequest;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::UserId;
use crate::error::{ErrorResponse, HttpAppError};
use crate::sink_bridge::respond_with_sink;
use crate::state::AppState;

/// Download a file.
///
/// Without a `Range` header this streams the whole object as an attachment.
/// With one it serves a single inclusive window (206) and participates in the
/// active-stream protocol: a new range request for the same file and user
/// replaces the previous one.
#[utoipa::path(
    get,
    path = "/api/v1/files/{id}/download",
    tag = "files",
    params(
        ("id" = Uuid, Path, description = "File ID"),
        ("Range" = Option<String>, Header, description = "Single byte range, e.g. bytes=1000-1999")
    ),
    responses(
        (status = 200, description = "Whole file", content_type = "application/octet-stream"),
        (status = 206, description = "Requested byte range", content_type = "application/octet-stream"),
        (status = 400, description = "Malformed or unsatisfiable range", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, headers), fields(user_id = %user.0, file_id = %id, operation = "download_file"))]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    user: UserId,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    let range = match headers.get(header::RANGE) {
        None => None,
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| AppError::BadRequest("Malformed Range header".to_string()))?;
            Some(RangeRequest::parse(raw).ok_or_else(|| {
                AppError::BadRequest(format!("Unsupported Range header: {}", raw))
            })?)
        }
    };

    let status = if range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let downloads = state.downloads.clone();
    respond_with_sink(status, move |mut sink| async move {
        downloads.serve(id, user.0, range, &mut sink).await
    })
    .await
}

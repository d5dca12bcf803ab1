use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::UserId;
use crate::error::{ErrorResponse, HttpAppError};
use crate::sink_bridge::respond_with_sink;
use crate::state::AppState;

/// Serve a preview.
///
/// `id` may be a thumbnail record id, a file id, or a file's linked thumbnail
/// id; resolution walks those strategies in order. Images stream the original
/// object, videos decode a single downscaled frame on demand.
#[utoipa::path(
    get,
    path = "/api/v1/files/{id}/thumbnail",
    tag = "files",
    params(
        ("id" = Uuid, Path, description = "Thumbnail or file ID")
    ),
    responses(
        (status = 200, description = "Preview bytes", content_type = "application/octet-stream"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "No preview available", body = ErrorResponse),
        (status = 502, description = "Frame decoding failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(user_id = %user.0, preview_id = %id, operation = "get_thumbnail"))]
pub async fn get_thumbnail(
    State(state): State<Arc<AppState>>,
    user: UserId,
    Path(id): Path<Uuid>,
) -> Result<Response, HttpAppError> {
    let previews = state.previews.clone();
    respond_with_sink(StatusCode::OK, move |mut sink| async move {
        previews.resolve_preview(id, user.0, &mut sink).await
    })
    .await
}

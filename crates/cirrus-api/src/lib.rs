//! Cirrus HTTP API.
//!
//! Thin axum surface over the transfer core: multipart bodies are forwarded
//! as upload events, downloads and previews stream through a channel-bridged
//! response sink.

pub mod api_doc;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod multipart;
pub mod sink_bridge;
pub mod state;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::state::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(api_doc::ApiDoc::openapi())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/v1/files", post(handlers::file_upload::upload_file))
        .route(
            "/api/v1/files/folder",
            post(handlers::folder_upload::upload_folder),
        )
        .route(
            "/api/v1/files/{id}/download",
            get(handlers::file_download::download_file),
        )
        .route(
            "/api/v1/files/{id}/thumbnail",
            get(handlers::thumbnail::get_thumbnail),
        )
        .route("/api-doc/openapi.json", get(openapi_json))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

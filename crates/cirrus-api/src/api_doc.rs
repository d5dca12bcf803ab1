//! OpenAPI document, served at `/api-doc/openapi.json`.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers;
use crate::handlers::folder_upload::{FolderUploadItem, FolderUploadResponse};
use cirrus_core::models::{FileMetadata, FileRecord, ThumbnailRecord};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::file_upload::upload_file,
        handlers::folder_upload::upload_folder,
        handlers::file_download::download_file,
        handlers::thumbnail::get_thumbnail,
    ),
    components(schemas(
        ErrorResponse,
        FileRecord,
        FileMetadata,
        ThumbnailRecord,
        FolderUploadResponse,
        FolderUploadItem,
    )),
    tags(
        (name = "files", description = "File upload, download, and previews"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

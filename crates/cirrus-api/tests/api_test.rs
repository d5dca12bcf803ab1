//! HTTP surface tests over in-memory backends: multipart ingestion, streaming
//! downloads with ranges, previews, and the error response contract.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use cirrus_api::build_router;
use cirrus_api::state::AppState;
use cirrus_core::constants::DEFAULT_IMAGE_PREVIEW_MAX_BYTES;
use cirrus_core::models::FileRecord;
use cirrus_core::{Config, StorageBackend};
use cirrus_db::{MemoryMetadataStore, MetadataStore};
use cirrus_storage::{file_locator, MemoryStorage};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "test-boundary";

fn test_config() -> Config {
    Config {
        server_port: 0,
        cors_origins: vec!["*".to_string()],
        environment: "test".to_string(),
        database_url: None,
        db_max_connections: 1,
        storage_backend: StorageBackend::Memory,
        local_storage_path: "./data/files".to_string(),
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        video_thumbnails_enabled: true,
        image_preview_max_bytes: DEFAULT_IMAGE_PREVIEW_MAX_BYTES,
        ffmpeg_path: "ffmpeg".to_string(),
        batch_inactivity_timeout: Duration::from_millis(500),
        stream_idle_timeout: Duration::from_secs(300),
    }
}

struct TestApp {
    router: Router,
    storage: Arc<MemoryStorage>,
    store: Arc<MemoryMetadataStore>,
}

fn test_app() -> TestApp {
    let storage = Arc::new(MemoryStorage::new());
    let store = Arc::new(MemoryMetadataStore::new());
    let state = AppState::new(test_config(), storage.clone(), store.clone());
    TestApp {
        router: build_router(state),
        storage,
        store,
    }
}

fn text_part(name: &str, value: &str) -> Vec<u8> {
    format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
        BOUNDARY, name, value
    )
    .into_bytes()
}

fn file_part(name: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut part = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
        BOUNDARY, name, filename, content_type
    )
    .into_bytes();
    part.extend_from_slice(data);
    part.extend_from_slice(b"\r\n");
    part
}

fn close_multipart(mut body: Vec<u8>) -> Vec<u8> {
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, user: Uuid, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", user.to_string())
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn seed_file(app: &TestApp, owner: Uuid, name: &str, data: Vec<u8>) -> FileRecord {
    let locator = file_locator(owner, name);
    app.storage.put_object(&locator, data.clone());
    let record = FileRecord::committed(
        name.to_string(),
        owner,
        "/".to_string(),
        locator,
        data.len() as i64,
    );
    app.store.create_file(&record).await.unwrap();
    record
}

#[tokio::test]
async fn test_upload_then_download_roundtrip() {
    let app = test_app();
    let user = Uuid::new_v4();
    let data = vec![42u8; 4096];

    let mut body = text_part("parent", "/docs");
    body.extend(text_part("size", "4096"));
    body.extend(file_part("file", "report.pdf", "application/pdf", &data));
    let body = close_multipart(body);

    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/api/v1/files", user, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let record: FileRecord = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(record.filename, "report.pdf");
    assert_eq!(record.length, 4096);
    assert_eq!(record.metadata.parent, "/docs");
    assert!(!record.metadata.processing_file);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}/download", record.id))
                .header("x-user-id", user.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"report.pdf\""));
    assert_eq!(body_bytes(response).await, data);
}

#[tokio::test]
async fn test_range_download_returns_partial_content() {
    let app = test_app();
    let user = Uuid::new_v4();
    let data: Vec<u8> = (0..5000).map(|i| (i % 251) as u8).collect();
    let record = seed_file(&app, user, "clip.mp4", data.clone()).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}/download", record.id))
                .header("x-user-id", user.to_string())
                .header(header::RANGE, "bytes=1000-1999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 1000-1999/5000");
    assert_eq!(headers[header::CONTENT_LENGTH], "1000");
    assert!(headers.get(header::CONTENT_DISPOSITION).is_none());
    assert_eq!(body_bytes(response).await, data[1000..2000]);
}

#[tokio::test]
async fn test_malformed_range_rejected() {
    let app = test_app();
    let user = Uuid::new_v4();
    let record = seed_file(&app, user, "clip.mp4", vec![0u8; 100]).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}/download", record.id))
                .header("x-user-id", user.to_string())
                .header(header::RANGE, "bytes=oops")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_missing_identity_forbidden() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}/download", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_foreign_file_download_forbidden() {
    let app = test_app();
    let owner = Uuid::new_v4();
    let record = seed_file(&app, owner, "secret.pdf", vec![1u8; 64]).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}/download", record.id))
                .header("x-user-id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_file_download_not_found() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}/download", Uuid::new_v4()))
                .header("x-user-id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_folder_upload_reports_items_and_attaches_previews() {
    let app = test_app();
    let user = Uuid::new_v4();

    let mut body = text_part("total-files", "2");
    body.extend(text_part("parent", "/album"));
    body.extend(text_part(
        "file-data",
        r#"{"index":"0","name":"cat.png","size":2048}"#,
    ));
    body.extend(file_part("0", "cat.png", "image/png", &vec![7u8; 2048]));
    body.extend(text_part(
        "file-data",
        r#"{"index":"1","name":"notes.txt","size":16}"#,
    ));
    body.extend(file_part("1", "notes.txt", "text/plain", &vec![8u8; 16]));
    let body = close_multipart(body);

    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/api/v1/files/folder", user, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let outcome: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(outcome["declared_total"], 2);
    assert_eq!(outcome["succeeded"], 2);
    assert_eq!(outcome["timed_out"], false);
    assert_eq!(outcome["parent"], "/album");
    assert_eq!(outcome["items"].as_array().unwrap().len(), 2);

    // The image got a preview; fetch it through the thumbnail route.
    let image_item = outcome["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["name"] == "cat.png")
        .unwrap();
    let image_id: Uuid = image_item["file_id"].as_str().unwrap().parse().unwrap();
    let image = app.store.get_file(image_id).await.unwrap().unwrap();
    let thumb_id = image.metadata.thumbnail_id.unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}/thumbnail", thumb_id))
                .header("x-user-id", user.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(body_bytes(response).await, vec![7u8; 2048]);
}

#[tokio::test]
async fn test_folder_upload_with_no_parts_conflicts() {
    let app = test_app();
    let user = Uuid::new_v4();

    let mut body = text_part("total-files", "2");
    body.extend(text_part("parent", "/album"));
    let body = close_multipart(body);

    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/api/v1/files/folder", user, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["code"], "BATCH_INCOMPLETE");
}

#[tokio::test]
async fn test_thumbnail_by_file_id_streams_image_original() {
    let app = test_app();
    let user = Uuid::new_v4();
    let data = vec![5u8; 512];
    let record = seed_file(&app, user, "photo.jpg", data.clone()).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/files/{}/thumbnail", record.id))
                .header("x-user-id", user.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(body_bytes(response).await, data);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

//! Single-file ingestion pipeline.
//!
//! Sanitize the client filename, probe storage for a collision-free name,
//! stream the bytes durably, re-measure the persisted size, then commit the
//! metadata record. A record only ever exists for bytes that are fully
//! persisted; on a failed write the partial object is discarded and nothing
//! is committed.

use chrono::Utc;
use cirrus_core::filename::{sanitize_filename, suffixed_name};
use cirrus_core::media::is_video_filename;
use cirrus_core::models::{FileMetadata, FileRecord};
use cirrus_core::AppError;
use cirrus_db::MetadataStore;
use cirrus_storage::{file_locator, Storage};
use futures::StreamExt;
use std::sync::Arc;
use uuid::Uuid;

use crate::transport::{part_reader, FilePartStream, UploadEvent, UploadEventStream};

pub struct UploadPipeline {
    storage: Arc<dyn Storage>,
    store: Arc<dyn MetadataStore>,
}

/// Result of a single-file upload request.
pub struct SingleUpload {
    pub file: FileRecord,
    pub parent: String,
}

impl UploadPipeline {
    pub fn new(storage: Arc<dyn Storage>, store: Arc<dyn MetadataStore>) -> Self {
        Self { storage, store }
    }

    /// Find a filename that has no object in storage yet, probing
    /// `name`, `name(0)`, `name(1)`, ... against the owner's namespace.
    pub async fn unique_filename(&self, owner: Uuid, name: &str) -> Result<String, AppError> {
        let mut candidate = name.to_string();
        let mut counter: u32 = 0;
        while self.storage.exists(&file_locator(owner, &candidate)).await? {
            candidate = suffixed_name(name, counter);
            counter += 1;
        }
        Ok(candidate)
    }

    /// Ingest one file part end to end and return the committed record.
    ///
    /// `declared_size` is the client's claim; the record carries the size the
    /// storage backend reports after the write.
    pub async fn ingest(
        &self,
        owner: Uuid,
        raw_filename: &str,
        parent: &str,
        declared_size: i64,
        content: FilePartStream,
    ) -> Result<FileRecord, AppError> {
        let clean = sanitize_filename(raw_filename);
        let filename = self.unique_filename(owner, &clean).await?;
        let locator = file_locator(owner, &filename);

        let mut metadata = FileMetadata {
            owner,
            parent: parent.to_string(),
            parent_list: vec![parent.to_string()],
            has_thumbnail: false,
            thumbnail_id: None,
            is_video: is_video_filename(&filename),
            size: declared_size,
            locator: locator.clone(),
            processing_file: true,
        };

        tracing::debug!(%owner, filename = %filename, "Starting upload write");

        if let Err(e) = self.storage.write_stream(&locator, part_reader(content)).await {
            if let Err(del) = self.storage.delete(&locator).await {
                tracing::warn!(locator = %locator, error = %del, "Failed to discard partial upload");
            }
            return Err(e.into());
        }

        // Authoritative size is what actually landed in storage.
        let length = self.storage.content_length(&locator).await? as i64;
        metadata.size = length;
        metadata.processing_file = false;

        let record = FileRecord {
            id: Uuid::new_v4(),
            filename,
            upload_date: Utc::now(),
            length,
            metadata,
        };

        if let Err(e) = self.store.create_file(&record).await {
            if let Err(del) = self.storage.delete(&locator).await {
                tracing::warn!(locator = %locator, error = %del, "Failed to discard orphaned upload");
            }
            return Err(e);
        }

        tracing::info!(
            file_id = %record.id,
            %owner,
            size_bytes = length,
            "Upload committed"
        );
        Ok(record)
    }

    /// Consume a single-file upload request: scalar fields first, then exactly
    /// one file part. No preview decisioning runs on this path.
    pub async fn ingest_single(
        &self,
        owner: Uuid,
        mut events: UploadEventStream,
    ) -> Result<SingleUpload, AppError> {
        let mut parent = "/".to_string();
        let mut declared_size: i64 = 0;

        while let Some(event) = events.next().await {
            match event {
                UploadEvent::Field { name, value } => match name.as_str() {
                    "parent" => parent = value,
                    "size" => declared_size = value.parse().unwrap_or(0),
                    _ => {}
                },
                UploadEvent::File { filename, content, .. } => {
                    let file = self
                        .ingest(owner, &filename, &parent, declared_size, content)
                        .await?;
                    return Ok(SingleUpload { file, parent });
                }
            }
        }

        Err(AppError::BadRequest(
            "Upload request contained no file part".to_string(),
        ))
    }
}

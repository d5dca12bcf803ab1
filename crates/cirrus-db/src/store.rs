//! Metadata store capability interface.
//!
//! Uniqueness and ownership constraints are enforced by the caller (the
//! transfer core checks ownership after lookup, matching its authorization
//! error taxonomy); the store only persists and retrieves.

use async_trait::async_trait;
use cirrus_core::models::{FileRecord, ThumbnailRecord};
use cirrus_core::AppError;
use uuid::Uuid;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Commit a file record. Called exactly once per successful upload, after
    /// the write stream finished.
    async fn create_file(&self, file: &FileRecord) -> Result<(), AppError>;

    /// Fetch a file by id, unscoped. Callers perform the owner check so a
    /// foreign owner surfaces as Forbidden rather than NotFound.
    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>, AppError>;

    /// Fetch a file by id, owner-scoped.
    async fn get_file_for_owner(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<FileRecord>, AppError>;

    /// Reverse lookup: the file whose `metadata.thumbnail_id` equals `thumbnail_id`.
    async fn find_file_by_thumbnail(
        &self,
        thumbnail_id: Uuid,
        owner: Uuid,
    ) -> Result<Option<FileRecord>, AppError>;

    /// Link a thumbnail: sets `has_thumbnail` and `thumbnail_id`, returning
    /// the updated record, or None when the file does not exist.
    async fn set_thumbnail(
        &self,
        file_id: Uuid,
        thumbnail_id: Uuid,
    ) -> Result<Option<FileRecord>, AppError>;

    async fn create_thumbnail(&self, thumbnail: &ThumbnailRecord) -> Result<(), AppError>;

    async fn get_thumbnail_for_owner(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<ThumbnailRecord>, AppError>;
}

//! Postgres metadata store.
//!
//! Runtime queries (no compile-time database), schema owned by the
//! `migrations/` folder in this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cirrus_core::models::{FileMetadata, FileRecord, ThumbnailRecord};
use cirrus_core::AppError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::MetadataStore;

#[derive(Debug, FromRow)]
struct FileRow {
    id: Uuid,
    filename: String,
    upload_date: DateTime<Utc>,
    length: i64,
    owner: Uuid,
    parent: String,
    parent_list: Vec<String>,
    has_thumbnail: bool,
    thumbnail_id: Option<Uuid>,
    is_video: bool,
    size: i64,
    locator: String,
    processing_file: bool,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        FileRecord {
            id: row.id,
            filename: row.filename,
            upload_date: row.upload_date,
            length: row.length,
            metadata: FileMetadata {
                owner: row.owner,
                parent: row.parent,
                parent_list: row.parent_list,
                has_thumbnail: row.has_thumbnail,
                thumbnail_id: row.thumbnail_id,
                is_video: row.is_video,
                size: row.size,
                locator: row.locator,
                processing_file: row.processing_file,
            },
        }
    }
}

#[derive(Debug, FromRow)]
struct ThumbnailRow {
    id: Uuid,
    name: String,
    owner: Uuid,
    locator: String,
    original_file: Uuid,
}

impl From<ThumbnailRow> for ThumbnailRecord {
    fn from(row: ThumbnailRow) -> Self {
        ThumbnailRecord {
            id: row.id,
            name: row.name,
            owner: row.owner,
            locator: row.locator,
            original_file: row.original_file,
        }
    }
}

const SELECT_FILE: &str = "SELECT id, filename, upload_date, length, owner, parent, parent_list, \
     has_thumbnail, thumbnail_id, is_video, size, locator, processing_file FROM files";

#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and run pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect: {}", e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn create_file(&self, file: &FileRecord) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO files (id, filename, upload_date, length, owner, parent, parent_list, \
             has_thumbnail, thumbnail_id, is_video, size, locator, processing_file) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(file.id)
        .bind(&file.filename)
        .bind(file.upload_date)
        .bind(file.length)
        .bind(file.metadata.owner)
        .bind(&file.metadata.parent)
        .bind(&file.metadata.parent_list)
        .bind(file.metadata.has_thumbnail)
        .bind(file.metadata.thumbnail_id)
        .bind(file.metadata.is_video)
        .bind(file.metadata.size)
        .bind(&file.metadata.locator)
        .bind(file.metadata.processing_file)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileRow> =
            sqlx::query_as(&format!("{} WHERE id = $1", SELECT_FILE))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn get_file_for_owner(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileRow> =
            sqlx::query_as(&format!("{} WHERE id = $1 AND owner = $2", SELECT_FILE))
                .bind(id)
                .bind(owner)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_file_by_thumbnail(
        &self,
        thumbnail_id: Uuid,
        owner: Uuid,
    ) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileRow> = sqlx::query_as(&format!(
            "{} WHERE thumbnail_id = $1 AND owner = $2",
            SELECT_FILE
        ))
        .bind(thumbnail_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn set_thumbnail(
        &self,
        file_id: Uuid,
        thumbnail_id: Uuid,
    ) -> Result<Option<FileRecord>, AppError> {
        let row: Option<FileRow> = sqlx::query_as(
            "UPDATE files SET has_thumbnail = TRUE, thumbnail_id = $2 WHERE id = $1 \
             RETURNING id, filename, upload_date, length, owner, parent, parent_list, \
             has_thumbnail, thumbnail_id, is_video, size, locator, processing_file",
        )
        .bind(file_id)
        .bind(thumbnail_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn create_thumbnail(&self, thumbnail: &ThumbnailRecord) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO thumbnails (id, name, owner, locator, original_file) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(thumbnail.id)
        .bind(&thumbnail.name)
        .bind(thumbnail.owner)
        .bind(&thumbnail.locator)
        .bind(thumbnail.original_file)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_thumbnail_for_owner(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<ThumbnailRecord>, AppError> {
        let row: Option<ThumbnailRow> = sqlx::query_as(
            "SELECT id, name, owner, locator, original_file FROM thumbnails \
             WHERE id = $1 AND owner = $2",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Into::into))
    }
}

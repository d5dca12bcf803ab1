//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must
//! implement.

use async_trait::async_trait;
use bytes::Bytes;
use cirrus_core::{AppError, StorageBackend};
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Invalid range: start {start}, end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(loc) => AppError::NotFound(format!("Object not found: {}", loc)),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked byte stream produced by storage reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// All storage backends (local filesystem, in-memory, S3) must implement this
/// trait. This allows the transfer core to work with any backend without
/// coupling to implementation details.
///
/// **Locator format:** `files/{owner_id}/{filename}`. See the crate root
/// documentation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open a full read stream for an object.
    async fn read_stream(&self, locator: &str) -> StorageResult<ByteStream>;

    /// Open a read stream over the inclusive byte range `[start, end]`.
    ///
    /// `end` past the object's last byte is an error; callers clamp against
    /// the persisted length first.
    async fn read_stream_range(
        &self,
        locator: &str,
        start: u64,
        end: u64,
    ) -> StorageResult<ByteStream>;

    /// Write an object from a reader, consuming it to EOF.
    ///
    /// The write is flushed durably before this returns. Returns the number of
    /// bytes written; callers re-measure with [`Storage::content_length`] for
    /// the authoritative persisted size.
    async fn write_stream(
        &self,
        locator: &str,
        reader: Pin<Box<dyn AsyncRead + Send>>,
    ) -> StorageResult<u64>;

    /// Check whether an object exists.
    async fn exists(&self, locator: &str) -> StorageResult<bool>;

    /// Size in bytes of a persisted object.
    async fn content_length(&self, locator: &str) -> StorageResult<u64>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, locator: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Reject locators that could escape the backend's namespace.
pub(crate) fn validate_locator(locator: &str) -> StorageResult<()> {
    if locator.contains("..") || locator.starts_with('/') || locator.is_empty() {
        return Err(StorageError::InvalidLocator(
            "Locator contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

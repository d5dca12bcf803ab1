use crate::traits::{validate_locator, ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncSeekExt, SeekFrom};
use tokio_util::io::ReaderStream;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/cirrus/files")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert a locator to a filesystem path with security validation.
    ///
    /// Rejects locators with path traversal sequences that could escape the
    /// base storage directory.
    fn locator_to_path(&self, locator: &str) -> StorageResult<PathBuf> {
        validate_locator(locator)?;

        let path = self.base_path.join(locator);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidLocator(
                    "Locator resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn wrap_reader_stream(file: fs::File, locator: &str) -> ByteStream {
        let locator = locator.to_string();
        let stream = ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(locator = %locator, error = %e, "Local storage read error");
                StorageError::ReadFailed(format!("Failed to read chunk: {}", e))
            })
        });
        Box::pin(stream)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read_stream(&self, locator: &str) -> StorageResult<ByteStream> {
        let path = self.locator_to_path(locator)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(locator.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        Ok(Self::wrap_reader_stream(file, locator))
    }

    async fn read_stream_range(
        &self,
        locator: &str,
        start: u64,
        end: u64,
    ) -> StorageResult<ByteStream> {
        if end < start {
            return Err(StorageError::InvalidRange { start, end });
        }

        let path = self.locator_to_path(locator)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(locator.to_string()));
        }

        let mut file = fs::File::open(&path).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let len = file
            .metadata()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .len();
        if start >= len || end >= len {
            return Err(StorageError::InvalidRange { start, end });
        }

        file.seek(SeekFrom::Start(start)).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to seek in {}: {}", path.display(), e))
        })?;

        let limited = tokio::io::AsyncReadExt::take(file, end - start + 1);
        let locator_owned = locator.to_string();
        let stream = ReaderStream::new(limited).map(move |result| {
            result.map_err(|e| {
                tracing::error!(locator = %locator_owned, error = %e, "Local storage ranged read error");
                StorageError::ReadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn write_stream(
        &self,
        locator: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send>>,
    ) -> StorageResult<u64> {
        let path = self.locator_to_path(locator)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to write stream to file {}: {}",
                path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            locator = %locator,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream write successful"
        );

        Ok(bytes_copied)
    }

    async fn exists(&self, locator: &str) -> StorageResult<bool> {
        let path = self.locator_to_path(locator)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn content_length(&self, locator: &str) -> StorageResult<u64> {
        let path = self.locator_to_path(locator)?;
        let meta = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(locator.to_string())
            } else {
                StorageError::BackendError(e.to_string())
            }
        })?;
        Ok(meta.len())
    }

    async fn delete(&self, locator: &str) -> StorageResult<()> {
        let path = self.locator_to_path(locator)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(locator = %locator, "Local storage delete successful");

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

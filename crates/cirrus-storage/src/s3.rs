use crate::traits::{validate_locator, ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{ObjectStoreExt, PutPayload};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }

    fn map_err(e: object_store::Error, locator: &str) -> StorageError {
        match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(locator.to_string()),
            other => StorageError::BackendError(other.to_string()),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn read_stream(&self, locator: &str) -> StorageResult<ByteStream> {
        validate_locator(locator)?;
        let location = Path::from(locator);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| Self::map_err(e, locator))?;

        let locator_owned = locator.to_string();
        let bucket = self.bucket.clone();
        let stream = result.into_stream().map(move |chunk| {
            chunk.map_err(|e| {
                tracing::error!(bucket = %bucket, locator = %locator_owned, error = %e, "S3 read error");
                StorageError::ReadFailed(e.to_string())
            })
        });

        Ok(Box::pin(stream))
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
        validate_locator(locator)?;
        let location = Path::from(locator);

        // object_store ranges are half-open; ours are inclusive.
        let bytes: Bytes = self
            .store
            .get_range(&location, start..end + 1)
            .await
            .map_err(|e| Self::map_err(e, locator))?;

        Ok(Box::pin(futures::stream::once(async move { Ok(bytes) })))
    }

    async fn write_stream(
        &self,
        locator: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send>>,
    ) -> StorageResult<u64> {
        validate_locator(locator)?;
        let location = Path::from(locator);
        let start = std::time::Instant::now();

        // Buffered single PUT; large objects would want multipart here.
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("Failed to read stream: {}", e)))?;
        let len = buf.len() as u64;

        self.store
            .put(&location, PutPayload::from(Bytes::from(buf)))
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;

        tracing::info!(
            bucket = %self.bucket,
            locator = %locator,
            size_bytes = len,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 stream write successful"
        );

        Ok(len)
    }

    async fn exists(&self, locator: &str) -> StorageResult<bool> {
        validate_locator(locator)?;
        let location = Path::from(locator);
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn content_length(&self, locator: &str) -> StorageResult<u64> {
        validate_locator(locator)?;
        let location = Path::from(locator);
        let meta = self
            .store
            .head(&location)
            .await
            .map_err(|e| Self::map_err(e, locator))?;
        Ok(meta.size)
    }

    async fn delete(&self, locator: &str) -> StorageResult<()> {
        validate_locator(locator)?;
        let location = Path::from(locator);
        match self.store.delete(&location).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

//! In-memory storage backend.
//!
//! Used by the transfer test-suite and available as `STORAGE_BACKEND=memory`
//! for local development. Read streams hold an observable handle count so
//! tests can assert that a replaced active stream actually closed, and writes
//! and reads can be failed on demand to exercise error paths.

use crate::traits::{validate_locator, ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Default)]
struct Inner {
    objects: Mutex<HashMap<String, Bytes>>,
    poisoned_reads: Mutex<HashSet<String>>,
    fail_writes: AtomicBool,
    open_read_handles: AtomicUsize,
}

/// In-memory storage over a shared object map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Inner>,
}

/// Decrements the open-handle count when the owning stream is dropped.
struct HandleGuard {
    inner: Arc<Inner>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.inner.open_read_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Chunked stream over an in-memory object, carrying its handle guard.
struct MemoryReadStream {
    chunks: std::vec::IntoIter<Result<Bytes, StorageError>>,
    _guard: HandleGuard,
}

impl Stream for MemoryReadStream {
    type Item = Result<Bytes, StorageError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunks.next())
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read streams currently open (not yet dropped).
    pub fn open_read_handles(&self) -> usize {
        self.inner.open_read_handles.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail, without storing anything.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make reads of `locator` yield an error after the first chunk.
    pub fn poison_read(&self, locator: &str) {
        self.inner
            .poisoned_reads
            .lock()
            .unwrap()
            .insert(locator.to_string());
    }

    /// Store an object directly, bypassing the write path. Test setup helper.
    pub fn put_object(&self, locator: &str, data: impl Into<Bytes>) {
        self.inner
            .objects
            .lock()
            .unwrap()
            .insert(locator.to_string(), data.into());
    }

    fn open(&self, locator: &str, data: Bytes) -> ByteStream {
        let poisoned = self
            .inner
            .poisoned_reads
            .lock()
            .unwrap()
            .contains(locator);

        let mut chunks: Vec<Result<Bytes, StorageError>> = data
            .chunks(CHUNK_SIZE)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        if poisoned {
            chunks.truncate(1);
            chunks.push(Err(StorageError::ReadFailed(format!(
                "simulated read failure for {}",
                locator
            ))));
        }

        self.inner.open_read_handles.fetch_add(1, Ordering::SeqCst);
        Box::pin(MemoryReadStream {
            chunks: chunks.into_iter(),
            _guard: HandleGuard {
                inner: Arc::clone(&self.inner),
            },
        })
    }

    fn get(&self, locator: &str) -> StorageResult<Bytes> {
        validate_locator(locator)?;
        self.inner
            .objects
            .lock()
            .unwrap()
            .get(locator)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(locator.to_string()))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read_stream(&self, locator: &str) -> StorageResult<ByteStream> {
        let data = self.get(locator)?;
        Ok(self.open(locator, data))
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
        let data = self.get(locator)?;
        let len = data.len() as u64;
        if start >= len || end >= len {
            return Err(StorageError::InvalidRange { start, end });
        }
        Ok(self.open(locator, data.slice(start as usize..=end as usize)))
    }

    async fn write_stream(
        &self,
        locator: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send>>,
    ) -> StorageResult<u64> {
        validate_locator(locator)?;

        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed(format!(
                "simulated write failure for {}",
                locator
            )));
        }

        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("Failed to read stream: {}", e)))?;

        let len = buf.len() as u64;
        self.inner
            .objects
            .lock()
            .unwrap()
            .insert(locator.to_string(), Bytes::from(buf));

        tracing::debug!(locator = %locator, size_bytes = len, "Memory storage write");

        Ok(len)
    }

    async fn exists(&self, locator: &str) -> StorageResult<bool> {
        validate_locator(locator)?;
        Ok(self.inner.objects.lock().unwrap().contains_key(locator))
    }

    async fn content_length(&self, locator: &str) -> StorageResult<u64> {
        Ok(self.get(locator)?.len() as u64)
    }

    async fn delete(&self, locator: &str) -> StorageResult<()> {
        validate_locator(locator)?;
        self.inner.objects.lock().unwrap().remove(locator);
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

//! Shared fixtures for the transfer integration tests: in-memory backends,
//! event-stream builders, and a stub frame decoder.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use cirrus_core::models::FileRecord;
use cirrus_core::AppError;
use cirrus_db::{MemoryMetadataStore, MetadataStore};
use cirrus_storage::{file_locator, ByteStream, MemoryStorage, Storage};
use cirrus_transfer::{
    FilePartStream, FrameDecoder, PreviewChain, PreviewPolicy, UploadEvent, UploadEventStream,
    UploadPipeline,
};
use std::sync::Arc;
use uuid::Uuid;

pub const STUB_FRAME: &[u8] = b"stub-jpeg-frame";

pub fn part(data: Vec<u8>) -> FilePartStream {
    Box::pin(futures::stream::iter(vec![Ok(Bytes::from(data))]))
}

/// A part stream that fails after its first chunk, like an interrupted
/// client connection.
pub fn failing_part(prefix: Vec<u8>) -> FilePartStream {
    Box::pin(futures::stream::iter(vec![
        Ok(Bytes::from(prefix)),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "part stream interrupted",
        )),
    ]))
}

pub fn events(items: Vec<UploadEvent>) -> UploadEventStream {
    Box::pin(futures::stream::iter(items))
}

pub fn field(name: &str, value: &str) -> UploadEvent {
    UploadEvent::Field {
        name: name.to_string(),
        value: value.to_string(),
    }
}

pub fn file_part(name: &str, filename: &str, content: FilePartStream) -> UploadEvent {
    UploadEvent::File {
        name: name.to_string(),
        filename: filename.to_string(),
        content,
    }
}

pub struct StubFrameDecoder;

#[async_trait]
impl FrameDecoder for StubFrameDecoder {
    async fn extract_frame(&self, _input: ByteStream) -> Result<Bytes, AppError> {
        Ok(Bytes::from_static(STUB_FRAME))
    }
}

pub struct Fixture {
    pub storage: Arc<MemoryStorage>,
    pub store: Arc<MemoryMetadataStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            store: Arc::new(MemoryMetadataStore::new()),
        }
    }

    pub fn storage_dyn(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    pub fn store_dyn(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    pub fn pipeline(&self) -> Arc<UploadPipeline> {
        Arc::new(UploadPipeline::new(self.storage_dyn(), self.store_dyn()))
    }

    pub fn previews(&self, policy: PreviewPolicy) -> Arc<PreviewChain> {
        Arc::new(PreviewChain::new(
            self.storage_dyn(),
            self.store_dyn(),
            Arc::new(StubFrameDecoder),
            policy,
        ))
    }

    /// Put an object and its committed record directly, bypassing ingestion.
    pub async fn seed_file(&self, owner: Uuid, name: &str, data: Vec<u8>) -> FileRecord {
        let locator = file_locator(owner, name);
        self.storage.put_object(&locator, data.clone());
        let record = FileRecord::committed(
            name.to_string(),
            owner,
            "/".to_string(),
            locator,
            data.len() as i64,
        );
        self.store.create_file(&record).await.unwrap();
        record
    }
}

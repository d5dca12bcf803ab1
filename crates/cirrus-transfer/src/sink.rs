//! Response sink abstraction.
//!
//! The transfer core never touches HTTP types directly; it writes a head
//! (status metadata) followed by body chunks into a [`ResponseSink`]. The API
//! crate bridges a sink onto an axum response body, and tests capture output
//! with [`MemorySink`].

use async_trait::async_trait;
use bytes::Bytes;

/// Response metadata emitted once, before any body byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub content_disposition: Option<String>,
    /// `bytes start-end/total`, set only for ranged downloads.
    pub content_range: Option<String>,
}

#[async_trait]
pub trait ResponseSink: Send {
    /// Emit response metadata. Called exactly once, before the first `write`.
    async fn send_head(&mut self, head: ResponseHead) -> std::io::Result<()>;

    /// Emit one body chunk.
    async fn write(&mut self, chunk: Bytes) -> std::io::Result<()>;

    /// Signal successful end of body.
    async fn finish(&mut self) -> std::io::Result<()>;
}

/// In-memory sink capturing head and body, with optional injected write
/// failure to simulate a client that disconnects mid-body.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub head: Option<ResponseHead>,
    pub body: Vec<u8>,
    pub finished: bool,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `write` once at least `bytes` body bytes have been accepted.
    pub fn with_write_failure_after(bytes: usize) -> Self {
        Self {
            fail_after: Some(bytes),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ResponseSink for MemorySink {
    async fn send_head(&mut self, head: ResponseHead) -> std::io::Result<()> {
        self.head = Some(head);
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> std::io::Result<()> {
        if let Some(limit) = self.fail_after {
            if self.body.len() >= limit {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "client disconnected",
                ));
            }
        }
        self.body.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(&mut self) -> std::io::Result<()> {
        self.finished = true;
        Ok(())
    }
}

//! Range-aware download streaming.
//!
//! Full downloads stream the whole object with an attachment disposition.
//! Ranged downloads serve media playback: each request registers itself for
//! its (file, requester) key, replacing and cancelling whichever stream was
//! active there, and leaves the file snapshot cached for the next seek.

mod registry;

pub use registry::{ActiveStreamRegistry, StreamKey};

use cirrus_core::filename::sanitize_filename;
use cirrus_core::media::content_type_for;
use cirrus_core::models::FileRecord;
use cirrus_core::AppError;
use cirrus_db::MetadataStore;
use cirrus_storage::{ByteStream, Storage};
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::sink::{ResponseHead, ResponseSink};

/// A parsed client range: start plus an optional inclusive end. The end is
/// clamped against the persisted length when the request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: u64,
    pub end: Option<u64>,
}

impl RangeRequest {
    /// Parse a `bytes=start-[end]` header value. Suffix ranges (`bytes=-n`)
    /// and multi-range requests are not supported.
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.strip_prefix("bytes=")?;
        let (start, end) = spec.split_once('-')?;
        let start = start.trim().parse::<u64>().ok()?;
        let end = end.trim();
        let end = if end.is_empty() {
            None
        } else {
            Some(end.parse::<u64>().ok()?)
        };
        if let Some(e) = end {
            if e < start {
                return None;
            }
        }
        Some(Self { start, end })
    }

    /// Resolve against the persisted length into an inclusive `[start, end]`.
    fn fixed(&self, length: i64) -> Result<(u64, u64), AppError> {
        if length <= 0 || self.start >= length as u64 {
            return Err(AppError::BadRequest(format!(
                "Range start {} is beyond the end of the file",
                self.start
            )));
        }
        let last = length as u64 - 1;
        let end = self.end.map_or(last, |e| e.min(last));
        Ok((self.start, end))
    }
}

/// RFC 6266 attachment disposition with a UTF-8 fallback parameter.
fn attachment_disposition(filename: &str) -> String {
    let clean = sanitize_filename(filename);
    let encoded = utf8_percent_encode(&clean, NON_ALPHANUMERIC);
    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", clean, encoded)
}

/// Copy a byte stream into a sink, stopping early if `cancel` fires.
///
/// Returns whether the stream ran to completion (a cancelled pipe is not an
/// error; its registry entry already belongs to the replacement).
pub(crate) async fn pipe_to_sink(
    mut stream: ByteStream,
    sink: &mut dyn ResponseSink,
    cancel: Option<&CancellationToken>,
) -> Result<bool, AppError> {
    loop {
        let chunk = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("Stream replaced, stopping pipe");
                    return Ok(false);
                }
                chunk = stream.next() => chunk,
            },
            None => stream.next().await,
        };
        match chunk {
            Some(Ok(bytes)) => sink
                .write(bytes)
                .await
                .map_err(|e| AppError::Internal(format!("Response write failed: {}", e)))?,
            Some(Err(e)) => return Err(e.into()),
            None => break,
        }
    }
    sink.finish()
        .await
        .map_err(|e| AppError::Internal(format!("Response finish failed: {}", e)))?;
    Ok(true)
}

pub struct DownloadStreamer {
    storage: Arc<dyn Storage>,
    store: Arc<dyn MetadataStore>,
    registry: ActiveStreamRegistry,
}

impl DownloadStreamer {
    pub fn new(
        storage: Arc<dyn Storage>,
        store: Arc<dyn MetadataStore>,
        stream_idle_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            store,
            registry: ActiveStreamRegistry::new(stream_idle_timeout),
        }
    }

    pub fn registry(&self) -> &ActiveStreamRegistry {
        &self.registry
    }

    async fn lookup_authorized(&self, file_id: Uuid, user: Uuid) -> Result<FileRecord, AppError> {
        let file = self
            .store
            .get_file(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;
        if file.owner() != user {
            return Err(AppError::Forbidden("Not the owner of this file".to_string()));
        }
        Ok(file)
    }

    /// Serve a download into `sink`.
    ///
    /// Without a range this is a plain attachment download. With a range it
    /// joins the active-stream protocol: a cached snapshot from a previous
    /// range request on the same key skips the metadata lookup, and the
    /// previous stream is cancelled before the new one opens.
    pub async fn serve(
        &self,
        file_id: Uuid,
        user: Uuid,
        range: Option<RangeRequest>,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), AppError> {
        match range {
            None => self.serve_full(file_id, user, sink).await,
            Some(range) => self.serve_range(file_id, user, range, sink).await,
        }
    }

    async fn serve_full(
        &self,
        file_id: Uuid,
        user: Uuid,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), AppError> {
        let file = self.lookup_authorized(file_id, user).await?;
        let stream = self.storage.read_stream(file.locator()).await?;

        sink.send_head(ResponseHead {
            content_type: content_type_for(&file.filename).to_string(),
            content_length: Some(file.length as u64),
            content_disposition: Some(attachment_disposition(&file.filename)),
            content_range: None,
        })
        .await
        .map_err(|e| AppError::Internal(format!("Response head failed: {}", e)))?;

        pipe_to_sink(stream, sink, None).await?;
        tracing::debug!(%file_id, size_bytes = file.length, "Full download served");
        Ok(())
    }

    async fn serve_range(
        &self,
        file_id: Uuid,
        user: Uuid,
        range: RangeRequest,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), AppError> {
        let key = StreamKey { file_id, owner: user };

        // A snapshot cached by a previous range request on this key saves the
        // lookup; take() also cancels that request's pipe loop.
        let file = match self.registry.take(&key) {
            Some(snapshot) => snapshot,
            None => self.lookup_authorized(file_id, user).await?,
        };

        let (start, end) = range.fixed(file.length)?;
        let stream = self.storage.read_stream_range(file.locator(), start, end).await?;

        let cancel = CancellationToken::new();
        let stamp = self.registry.insert(key, file.clone(), cancel.clone());

        let result = async {
            sink.send_head(ResponseHead {
                content_type: content_type_for(&file.filename).to_string(),
                content_length: Some(end - start + 1),
                content_disposition: None,
                content_range: Some(format!("bytes {}-{}/{}", start, end, file.length)),
            })
            .await
            .map_err(|e| AppError::Internal(format!("Response head failed: {}", e)))?;
            pipe_to_sink(stream, sink, Some(&cancel)).await
        }
        .await;

        match result {
            Ok(_completed) => {
                tracing::debug!(%file_id, start, end, "Range served");
                Ok(())
            }
            Err(e) => {
                // Drop the registration before surfacing the failure, unless
                // a newer request already owns the key.
                self.registry.remove_if(&key, stamp);
                Err(e)
            }
        }
    }
}

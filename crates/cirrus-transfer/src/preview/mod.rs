//! Preview attachment and resolution.
//!
//! Attachment decides, at upload time, whether a committed file gets a
//! preview: videos get a self-referential marker (the preview is decoded on
//! demand), small images get a thumbnail record aliasing the original object.
//! Resolution walks an ordered chain of strategies until one can produce
//! bytes for a preview identifier.

mod frame;

pub use frame::{FfmpegFrameDecoder, FrameDecoder};

use cirrus_core::constants::DEFAULT_IMAGE_PREVIEW_MAX_BYTES;
use cirrus_core::media::{content_type_for, is_image_filename};
use cirrus_core::models::{FileRecord, ThumbnailRecord};
use cirrus_core::{AppError, Config};
use cirrus_db::MetadataStore;
use cirrus_storage::Storage;
use std::sync::Arc;
use uuid::Uuid;

use crate::download::pipe_to_sink;
use crate::sink::{ResponseHead, ResponseSink};

/// Deployment knobs for preview decisioning.
#[derive(Debug, Clone)]
pub struct PreviewPolicy {
    pub video_thumbnails_enabled: bool,
    pub image_preview_max_bytes: i64,
}

impl Default for PreviewPolicy {
    fn default() -> Self {
        Self {
            video_thumbnails_enabled: true,
            image_preview_max_bytes: DEFAULT_IMAGE_PREVIEW_MAX_BYTES,
        }
    }
}

impl From<&Config> for PreviewPolicy {
    fn from(config: &Config) -> Self {
        Self {
            video_thumbnails_enabled: config.video_thumbnails_enabled,
            image_preview_max_bytes: config.image_preview_max_bytes,
        }
    }
}

pub struct PreviewChain {
    storage: Arc<dyn Storage>,
    store: Arc<dyn MetadataStore>,
    decoder: Arc<dyn FrameDecoder>,
    policy: PreviewPolicy,
}

impl PreviewChain {
    pub fn new(
        storage: Arc<dyn Storage>,
        store: Arc<dyn MetadataStore>,
        decoder: Arc<dyn FrameDecoder>,
        policy: PreviewPolicy,
    ) -> Self {
        Self {
            storage,
            store,
            decoder,
            policy,
        }
    }

    /// Decide and attach a preview for a freshly committed file.
    ///
    /// Preview failures degrade: the committed record is returned unchanged
    /// and the upload still succeeds.
    pub async fn attach_preview(&self, file: FileRecord) -> FileRecord {
        if file.metadata.is_video {
            if !self.policy.video_thumbnails_enabled {
                return file;
            }
            // Videos carry a self-referential marker; the frame is decoded
            // when the preview is requested.
            return match self.store.set_thumbnail(file.id, file.id).await {
                Ok(Some(updated)) => updated,
                Ok(None) => file,
                Err(e) => {
                    tracing::warn!(file_id = %file.id, error = %e, "Failed to mark video preview");
                    file
                }
            };
        }

        if is_image_filename(&file.filename) && file.length < self.policy.image_preview_max_bytes {
            return match self.attach_image_preview(&file).await {
                Ok(updated) => updated,
                Err(e) => {
                    tracing::warn!(file_id = %file.id, error = %e, "Failed to attach image preview");
                    file
                }
            };
        }

        file
    }

    async fn attach_image_preview(&self, file: &FileRecord) -> Result<FileRecord, AppError> {
        let thumbnail = ThumbnailRecord::aliasing(
            file.filename.clone(),
            file.owner(),
            file.locator().to_string(),
            file.id,
        );
        self.store.create_thumbnail(&thumbnail).await?;
        let updated = self
            .store
            .set_thumbnail(file.id, thumbnail.id)
            .await?
            .ok_or_else(|| AppError::NotFound("File vanished before preview link".to_string()))?;
        tracing::debug!(file_id = %file.id, thumbnail_id = %thumbnail.id, "Image preview attached");
        Ok(updated)
    }

    /// Serve preview bytes for `identifier` into `sink`.
    ///
    /// The identifier may name a thumbnail record, a file, or a file's linked
    /// thumbnail id; the strategies are tried in that order. Whichever record
    /// resolves, bytes only flow for objects the requester owns.
    pub async fn resolve_preview(
        &self,
        identifier: Uuid,
        user: Uuid,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), AppError> {
        if user.is_nil() {
            return Err(AppError::Forbidden("Missing user identity".to_string()));
        }

        if let Some(thumbnail) = self.store.get_thumbnail_for_owner(identifier, user).await? {
            if self.storage.exists(&thumbnail.locator).await? {
                return self.serve_object(&thumbnail.locator, &thumbnail.name, sink).await;
            }
            tracing::debug!(thumbnail_id = %identifier, "Thumbnail object missing, falling back");
        }

        let file = match self.store.get_file(identifier).await? {
            Some(file) => {
                if file.owner() != user {
                    return Err(AppError::Forbidden("Not the owner of this file".to_string()));
                }
                file
            }
            None => self
                .store
                .find_file_by_thumbnail(identifier, user)
                .await?
                .ok_or_else(|| AppError::NotFound("Preview not found".to_string()))?,
        };

        if !self.storage.exists(file.locator()).await? {
            return Err(AppError::NotFound("File object missing in storage".to_string()));
        }

        if is_image_filename(&file.filename) {
            return self.serve_object(file.locator(), &file.filename, sink).await;
        }

        if file.metadata.is_video {
            let input = self.storage.read_stream(file.locator()).await?;
            let frame = self.decoder.extract_frame(input).await?;
            sink.send_head(ResponseHead {
                content_type: "image/jpeg".to_string(),
                content_length: Some(frame.len() as u64),
                content_disposition: None,
                content_range: None,
            })
            .await
            .map_err(|e| AppError::Internal(format!("Response head failed: {}", e)))?;
            sink.write(frame)
                .await
                .map_err(|e| AppError::Internal(format!("Response write failed: {}", e)))?;
            sink.finish()
                .await
                .map_err(|e| AppError::Internal(format!("Response finish failed: {}", e)))?;
            tracing::debug!(file_id = %file.id, "Video frame preview served");
            return Ok(());
        }

        Err(AppError::NotFound(
            "No preview available for this file type".to_string(),
        ))
    }

    async fn serve_object(
        &self,
        locator: &str,
        name: &str,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), AppError> {
        let length = self.storage.content_length(locator).await?;
        let stream = self.storage.read_stream(locator).await?;
        sink.send_head(ResponseHead {
            content_type: content_type_for(name).to_string(),
            content_length: Some(length),
            content_disposition: None,
            content_range: None,
        })
        .await
        .map_err(|e| AppError::Internal(format!("Response head failed: {}", e)))?;
        pipe_to_sink(stream, sink, None).await?;
        Ok(())
    }
}

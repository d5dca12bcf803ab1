//! Single-frame video decoding.
//!
//! The decoder sits behind a trait so the preview chain can be exercised
//! without an ffmpeg binary. The production implementation shells out to
//! ffmpeg, feeding the video stream over stdin and collecting one downscaled
//! frame from stdout.

use async_trait::async_trait;
use bytes::Bytes;
use cirrus_core::constants::PREVIEW_FRAME_BOX;
use cirrus_core::AppError;
use cirrus_storage::ByteStream;
use futures::StreamExt;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[async_trait]
pub trait FrameDecoder: Send + Sync {
    /// Decode one downscaled frame (JPEG bytes) from a video byte stream.
    async fn extract_frame(&self, input: ByteStream) -> Result<Bytes, AppError>;
}

pub struct FfmpegFrameDecoder {
    ffmpeg_path: String,
}

impl FfmpegFrameDecoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl FrameDecoder for FfmpegFrameDecoder {
    async fn extract_frame(&self, mut input: ByteStream) -> Result<Bytes, AppError> {
        let scale = format!(
            "scale={}:{}:force_original_aspect_ratio=decrease",
            PREVIEW_FRAME_BOX, PREVIEW_FRAME_BOX
        );
        let mut child = Command::new(&self.ffmpeg_path)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-an",
                "-ss",
                "0",
                "-i",
                "pipe:0",
                "-frames:v",
                "1",
                "-vf",
                &scale,
                "-f",
                "image2",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AppError::FrameDecode(format!("Failed to spawn {}: {}", self.ffmpeg_path, e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::FrameDecode("ffmpeg stdin unavailable".to_string()))?;

        // ffmpeg stops reading once it has its frame; write errors just end
        // the feed.
        let feeder = tokio::spawn(async move {
            while let Some(chunk) = input.next().await {
                match chunk {
                    Ok(bytes) => {
                        if stdin.write_all(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Video read failed while feeding decoder");
                        break;
                    }
                }
            }
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AppError::FrameDecode(format!("ffmpeg did not exit cleanly: {}", e)))?;
        feeder.abort();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::FrameDecode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(AppError::FrameDecode("ffmpeg produced no frame".to_string()));
        }
        Ok(Bytes::from(output.stdout))
    }
}

//! Shared constants.

/// Size ceiling under which an uploaded image gets a preview record (15 MiB).
pub const DEFAULT_IMAGE_PREVIEW_MAX_BYTES: i64 = 15_728_640;

/// How long a batch upload may sit without progress before it resolves with
/// partial results.
pub const DEFAULT_BATCH_INACTIVITY_TIMEOUT_SECS: u64 = 30;

/// How long an abandoned active download stream stays registered before the
/// registry sweeps it.
pub const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 300;

/// Bounding box for single-frame video previews (longest side, aspect kept).
pub const PREVIEW_FRAME_BOX: u32 = 320;

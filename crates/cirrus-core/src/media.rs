//! Filename-extension content classification.
//!
//! Pure table lookups with no I/O so the classification can be tested
//! exhaustively against the fixed extension sets.

/// Extensions classified as images.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "webp", "svg", "tiff", "tif", "heic", "avif", "ico",
];

/// Extensions classified as videos.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "webm", "wmv", "flv", "mpg", "mpeg", "m4v", "3gp", "ts",
];

/// Lowercased extension of a filename, without the dot.
pub fn extension(filename: &str) -> Option<String> {
    let idx = filename.rfind('.')?;
    let ext = &filename[idx + 1..];
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

pub fn is_image_filename(filename: &str) -> bool {
    extension(filename)
        .map(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

pub fn is_video_filename(filename: &str) -> bool {
    extension(filename)
        .map(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

/// Content type to serve a file under, from its extension alone.
pub fn content_type_for(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("tiff") | Some("tif") => "image/tiff",
        Some("heic") => "image/heic",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("wmv") => "video/x-ms-wmv",
        Some("mpg") | Some("mpeg") => "video/mpeg",
        Some("3gp") => "video/3gpp",
        Some("ts") => "video/mp2t",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("zip") => "application/zip",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

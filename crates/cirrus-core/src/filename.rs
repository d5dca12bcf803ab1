//! Filename sanitization and collision-suffix helpers.

const MAX_FILENAME_LEN: usize = 255;

/// Strip any path components and replace characters that are unsafe in a
/// stored filename. Falls back to a generic name when nothing usable remains.
pub fn sanitize_filename(filename: &str) -> String {
    // `file_name()` is None for paths ending in `..`, roots, and the empty
    // string; those fall through to the generic fallback below.
    let base = std::path::Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let s: String = base
        .chars()
        .take(MAX_FILENAME_LEN)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' || c == ' ' || c == '(' || c == ')' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = s.trim();
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Split a filename into (stem, extension-with-dot).
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx..]),
        _ => (filename, ""),
    }
}

/// Candidate name for collision attempt `counter`: `stem(counter).ext`.
pub fn suffixed_name(filename: &str, counter: u32) -> String {
    let (stem, ext) = split_extension(filename);
    format!("{}({}){}", stem, counter, ext)
}

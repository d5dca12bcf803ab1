//! Shared locator generation for storage backends.
//!
//! Locator format: `files/{owner_id}/{filename}`.

use uuid::Uuid;

/// Generate the storage locator for a file owned by `owner`.
///
/// All backends must use this format so uniqueness probing and serving agree
/// on where an object lives.
pub fn file_locator(owner: Uuid, filename: &str) -> String {
    format!("files/{}/{}", owner, filename)
}

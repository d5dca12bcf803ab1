//! Domain models shared across Cirrus components.

mod file;
mod thumbnail;

pub use file::{FileMetadata, FileRecord};
pub use thumbnail::ThumbnailRecord;

//! Upload ingestion.

mod folder;
mod ingest;

pub use folder::{BatchItem, BatchOutcome, FolderUploadCoordinator};
pub use ingest::{SingleUpload, UploadPipeline};

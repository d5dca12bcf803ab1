//! Cirrus transfer core.
//!
//! Everything between the HTTP surface and the storage/metadata backends:
//! upload ingestion (single files and declared-size folder batches), range
//! aware download streaming with an active-stream registry, and the ordered
//! preview resolution chain.

pub mod download;
pub mod preview;
pub mod sink;
pub mod transport;
pub mod upload;

pub use download::{DownloadStreamer, RangeRequest};
pub use preview::{FfmpegFrameDecoder, FrameDecoder, PreviewChain, PreviewPolicy};
pub use sink::{MemorySink, ResponseHead, ResponseSink};
pub use transport::{FilePartStream, UploadEvent, UploadEventStream};
pub use upload::{BatchItem, BatchOutcome, FolderUploadCoordinator, SingleUpload, UploadPipeline};

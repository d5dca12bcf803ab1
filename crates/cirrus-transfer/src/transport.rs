//! Transport-neutral upload events.
//!
//! Multipart parsing lives in the API crate; the transfer core consumes an
//! ordered stream of scalar fields and file parts. Field events that describe
//! a part (`file-data`) must arrive before the part itself, mirroring the
//! field-before-file ordering of multipart bodies.

use bytes::Bytes;
use futures::Stream;
use serde::Deserialize;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// Body bytes of one file part.
pub type FilePartStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// One multipart event, in body order.
pub enum UploadEvent {
    /// A scalar form field.
    Field { name: String, value: String },
    /// A file part. `name` is the part's field name (the client-assigned part
    /// index on the batch path), `filename` the client's filename.
    File {
        name: String,
        filename: String,
        content: FilePartStream,
    },
}

pub type UploadEventStream = Pin<Box<dyn Stream<Item = UploadEvent> + Send>>;

/// Client-declared description of one batch part, sent as a `file-data` field
/// ahead of the part it describes.
#[derive(Debug, Clone, Deserialize)]
pub struct FilePartMeta {
    pub index: String,
    pub name: String,
    #[serde(default)]
    pub size: i64,
}

/// Adapt a file part stream into the reader shape storage writes consume.
pub fn part_reader(stream: FilePartStream) -> Pin<Box<dyn AsyncRead + Send>> {
    Box::pin(StreamReader::new(stream))
}

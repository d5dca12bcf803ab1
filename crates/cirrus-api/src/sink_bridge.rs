//! Bridge between the transfer core's response sink and axum bodies.
//!
//! The serving component runs in its own task, pushing the head through a
//! oneshot channel and body chunks through a bounded mpsc channel; the
//! handler waits for the head, then hands the receiving side to
//! `Body::from_stream`. Errors that strike before the head surface as a
//! normal error response; errors after it truncate the body.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use cirrus_core::AppError;
use cirrus_transfer::{ResponseHead, ResponseSink};
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::HttpAppError;

const BODY_CHANNEL_CAPACITY: usize = 16;

pub struct ChannelSink {
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    body_tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
}

fn closed() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "response consumer dropped")
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn send_head(&mut self, head: ResponseHead) -> std::io::Result<()> {
        self.head_tx
            .take()
            .ok_or_else(closed)?
            .send(head)
            .map_err(|_| closed())
    }

    async fn write(&mut self, chunk: Bytes) -> std::io::Result<()> {
        self.body_tx.send(Ok(chunk)).await.map_err(|_| closed())
    }

    async fn finish(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run a sink-writing operation in the background and turn its output into a
/// streaming HTTP response with the given status.
pub async fn respond_with_sink<F, Fut>(status: StatusCode, serve: F) -> Result<Response, HttpAppError>
where
    F: FnOnce(ChannelSink) -> Fut,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
    let err_tx = body_tx.clone();
    let sink = ChannelSink {
        head_tx: Some(head_tx),
        body_tx,
    };

    let fut = serve(sink);
    let task = tokio::spawn(async move {
        match fut.await {
            Ok(()) => Ok(()),
            Err(e) => {
                // After the head is sent this only truncates the body; the
                // error itself is already logged at the source.
                let _ = err_tx
                    .send(Err(std::io::Error::other(e.to_string())))
                    .await;
                Err(e)
            }
        }
    });

    let head = match head_rx.await {
        Ok(head) => head,
        Err(_) => {
            // The sink was dropped before a head was sent; surface the
            // operation's error as a plain error response.
            let err = match task.await {
                Ok(Err(e)) => e,
                Ok(Ok(())) => AppError::Internal("Response ended before head".to_string()),
                Err(join_err) => AppError::Internal(join_err.to_string()),
            };
            return Err(HttpAppError(err));
        }
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, head.content_type);
    if let Some(length) = head.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }
    if let Some(disposition) = head.content_disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition);
    }
    if let Some(range) = head.content_range {
        builder = builder.header(header::CONTENT_RANGE, range);
    }
    builder = builder.header(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    builder
        .body(Body::from_stream(ReceiverStream::new(body_rx)))
        .map_err(|e| HttpAppError(AppError::Internal(format!("Failed to build response: {}", e))))
}

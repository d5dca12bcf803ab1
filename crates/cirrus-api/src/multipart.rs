//! Multipart-to-upload-event forwarding.
//!
//! Walks the multipart body in order, emitting scalar fields as they appear
//! and file parts as chunk streams. Must run concurrently with the consumer
//! (`tokio::join!` in the handler): each file part's chunks are pumped through
//! a bounded channel while the transfer core reads them.

use axum::extract::Multipart;
use bytes::Bytes;
use cirrus_core::AppError;
use cirrus_transfer::UploadEvent;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const PART_CHANNEL_CAPACITY: usize = 8;

fn multipart_err(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Malformed multipart body: {}", e))
}

pub async fn forward_multipart(
    mut multipart: Multipart,
    events: mpsc::Sender<UploadEvent>,
) -> Result<(), AppError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_err)? {
        let name = field.name().unwrap_or_default().to_string();

        let Some(filename) = field.file_name().map(str::to_string) else {
            let value = field.text().await.map_err(multipart_err)?;
            if events.send(UploadEvent::Field { name, value }).await.is_err() {
                // Consumer resolved early (e.g. batch completed); nothing
                // left to forward.
                return Ok(());
            }
            continue;
        };

        let (chunk_tx, chunk_rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(PART_CHANNEL_CAPACITY);
        let event = UploadEvent::File {
            name,
            filename,
            content: Box::pin(ReceiverStream::new(chunk_rx)),
        };
        if events.send(event).await.is_err() {
            return Ok(());
        }

        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if chunk_tx.send(Ok(chunk)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = chunk_tx
                        .send(Err(std::io::Error::other(format!(
                            "Multipart read failed: {}",
                            e
                        ))))
                        .await;
                    break;
                }
            }
        }
    }
    Ok(())
}

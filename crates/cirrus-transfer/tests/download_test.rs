//! Download streaming integration tests: full downloads, range windows, and
//! the active-stream replacement protocol.

mod common;

use async_trait::async_trait;
use bytes::Bytes;
use cirrus_core::AppError;
use cirrus_transfer::{DownloadStreamer, MemorySink, RangeRequest, ResponseHead, ResponseSink};
use common::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

const IDLE: Duration = Duration::from_secs(300);

fn streamer(fx: &Fixture) -> Arc<DownloadStreamer> {
    Arc::new(DownloadStreamer::new(fx.storage_dyn(), fx.store_dyn(), IDLE))
}

fn bytes_of(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_full_download_streams_whole_file_as_attachment() {
    let fx = Fixture::new();
    let owner = Uuid::new_v4();
    let data = bytes_of(5000);
    let record = fx.seed_file(owner, "report.pdf", data.clone()).await;
    let streamer = streamer(&fx);

    let mut sink = MemorySink::new();
    streamer.serve(record.id, owner, None, &mut sink).await.unwrap();

    let head = sink.head.unwrap();
    assert_eq!(head.content_type, "application/pdf");
    assert_eq!(head.content_length, Some(5000));
    let disposition = head.content_disposition.unwrap();
    assert!(disposition.starts_with("attachment; filename=\"report.pdf\""));
    assert!(disposition.contains("filename*=UTF-8''"));
    assert_eq!(head.content_range, None);
    assert_eq!(sink.body, data);
    assert!(sink.finished);
    assert_eq!(fx.storage.open_read_handles(), 0);
    assert!(streamer.registry().is_empty());
}

#[tokio::test]
async fn test_range_returns_exact_window_without_disposition() {
    let fx = Fixture::new();
    let owner = Uuid::new_v4();
    let data = bytes_of(5000);
    let record = fx.seed_file(owner, "clip.mp4", data.clone()).await;
    let streamer = streamer(&fx);

    let mut sink = MemorySink::new();
    let range = RangeRequest { start: 1000, end: Some(1999) };
    streamer
        .serve(record.id, owner, Some(range), &mut sink)
        .await
        .unwrap();

    let head = sink.head.unwrap();
    assert_eq!(head.content_type, "video/mp4");
    assert_eq!(head.content_length, Some(1000));
    assert_eq!(head.content_disposition, None);
    assert_eq!(head.content_range.as_deref(), Some("bytes 1000-1999/5000"));
    assert_eq!(sink.body.len(), 1000);
    assert_eq!(sink.body, data[1000..2000]);
}

#[tokio::test]
async fn test_open_ended_range_clamps_to_file_length() {
    let fx = Fixture::new();
    let owner = Uuid::new_v4();
    let data = bytes_of(5000);
    let record = fx.seed_file(owner, "clip.mp4", data.clone()).await;
    let streamer = streamer(&fx);

    let mut sink = MemorySink::new();
    let range = RangeRequest { start: 4000, end: Some(999_999) };
    streamer
        .serve(record.id, owner, Some(range), &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.body, data[4000..]);
}

#[tokio::test]
async fn test_sequential_ranges_reuse_cached_snapshot() {
    let fx = Fixture::new();
    let owner = Uuid::new_v4();
    let record = fx.seed_file(owner, "clip.mp4", bytes_of(5000)).await;
    let streamer = streamer(&fx);

    let mut first = MemorySink::new();
    streamer
        .serve(
            record.id,
            owner,
            Some(RangeRequest { start: 0, end: Some(999) }),
            &mut first,
        )
        .await
        .unwrap();
    assert_eq!(fx.store.file_lookup_count(), 1);

    let mut second = MemorySink::new();
    streamer
        .serve(
            record.id,
            owner,
            Some(RangeRequest { start: 1000, end: None }),
            &mut second,
        )
        .await
        .unwrap();

    // The second seek hit the registry snapshot, not the metadata store.
    assert_eq!(fx.store.file_lookup_count(), 1);
    assert_eq!(streamer.registry().len(), 1);
    assert_eq!(fx.storage.open_read_handles(), 0);
}

/// Sink whose writes only proceed when the test grants a permit; used to hold
/// a pipe loop open while a second request replaces it.
struct GatedSink {
    gate: Arc<Semaphore>,
    body: Arc<Mutex<Vec<u8>>>,
}

#[async_trait]
impl ResponseSink for GatedSink {
    async fn send_head(&mut self, _head: ResponseHead) -> std::io::Result<()> {
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> std::io::Result<()> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gate closed"))?;
        permit.forget();
        self.body.lock().unwrap().extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_concurrent_seek_replaces_and_closes_previous_stream() {
    let fx = Fixture::new();
    let owner = Uuid::new_v4();
    let data = bytes_of(5000);
    let record = fx.seed_file(owner, "clip.mp4", data.clone()).await;
    let streamer = streamer(&fx);

    let gate = Arc::new(Semaphore::new(0));
    let first_body = Arc::new(Mutex::new(Vec::new()));
    let first_task = {
        let streamer = Arc::clone(&streamer);
        let mut sink = GatedSink {
            gate: Arc::clone(&gate),
            body: Arc::clone(&first_body),
        };
        let file_id = record.id;
        tokio::spawn(async move {
            streamer
                .serve(file_id, owner, Some(RangeRequest { start: 0, end: None }), &mut sink)
                .await
        })
    };

    // Wait until the first request holds its read handle and registration.
    while fx.storage.open_read_handles() < 1 || streamer.registry().is_empty() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let mut second = MemorySink::new();
    streamer
        .serve(
            record.id,
            owner,
            Some(RangeRequest { start: 1000, end: Some(1999) }),
            &mut second,
        )
        .await
        .unwrap();
    assert_eq!(second.body, data[1000..2000]);
    // Snapshot reuse: only the first request looked up metadata.
    assert_eq!(fx.store.file_lookup_count(), 1);

    // Unblock the first pipe loop; it observes the cancellation and stops.
    gate.add_permits(100);
    first_task.await.unwrap().unwrap();

    assert_eq!(streamer.registry().len(), 1);
    assert_eq!(fx.storage.open_read_handles(), 0);
}

#[tokio::test]
async fn test_range_start_past_length_rejected() {
    let fx = Fixture::new();
    let owner = Uuid::new_v4();
    let record = fx.seed_file(owner, "clip.mp4", bytes_of(5000)).await;
    let streamer = streamer(&fx);

    let mut sink = MemorySink::new();
    let result = streamer
        .serve(
            record.id,
            owner,
            Some(RangeRequest { start: 5000, end: None }),
            &mut sink,
        )
        .await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert!(sink.head.is_none());
    assert!(streamer.registry().is_empty());
}

#[tokio::test]
async fn test_foreign_user_forbidden_before_any_byte() {
    let fx = Fixture::new();
    let owner = Uuid::new_v4();
    let record = fx.seed_file(owner, "report.pdf", bytes_of(100)).await;
    let streamer = streamer(&fx);

    for range in [None, Some(RangeRequest { start: 0, end: None })] {
        let mut sink = MemorySink::new();
        let result = streamer.serve(record.id, Uuid::new_v4(), range, &mut sink).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert!(sink.head.is_none());
        assert!(sink.body.is_empty());
    }
}

#[tokio::test]
async fn test_unknown_file_not_found() {
    let fx = Fixture::new();
    let streamer = streamer(&fx);

    let mut sink = MemorySink::new();
    let result = streamer
        .serve(Uuid::new_v4(), Uuid::new_v4(), None, &mut sink)
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_failed_range_stream_clears_registration() {
    let fx = Fixture::new();
    let owner = Uuid::new_v4();
    let record = fx.seed_file(owner, "clip.mp4", bytes_of(5000)).await;
    fx.storage.poison_read(record.locator());
    let streamer = streamer(&fx);

    let mut sink = MemorySink::new();
    let result = streamer
        .serve(
            record.id,
            owner,
            Some(RangeRequest { start: 0, end: None }),
            &mut sink,
        )
        .await;

    assert!(matches!(result, Err(AppError::Storage(_))));
    assert!(streamer.registry().is_empty());
    assert_eq!(fx.storage.open_read_handles(), 0);
}

#[tokio::test]
async fn test_client_disconnect_mid_body_clears_registration() {
    let fx = Fixture::new();
    let owner = Uuid::new_v4();
    let record = fx.seed_file(owner, "big.mp4", bytes_of(200_000)).await;
    let streamer = streamer(&fx);

    let mut sink = MemorySink::with_write_failure_after(60_000);
    let result = streamer
        .serve(
            record.id,
            owner,
            Some(RangeRequest { start: 0, end: None }),
            &mut sink,
        )
        .await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    assert!(streamer.registry().is_empty());
}

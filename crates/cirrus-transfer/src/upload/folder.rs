//! Folder (batch) upload coordination.
//!
//! A batch request declares how many file parts it carries, then streams the
//! parts interleaved with `file-data` fields describing each one. Parts are
//! ingested concurrently; the batch resolves once per-part completions
//! (success or attributed failure) reach the declared total, or after a
//! bounded inactivity window. The window is refreshed by every event, every
//! part completion, and every body chunk an in-flight part delivers, so a
//! part whose stream stalls without erroring is abandoned and attributed
//! rather than waited on forever.

use cirrus_core::AppError;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::{Id as TaskId, JoinSet};
use tokio::time::Instant;
use uuid::Uuid;

use crate::preview::PreviewChain;
use crate::transport::{FilePartMeta, FilePartStream, UploadEvent, UploadEventStream};
use crate::upload::UploadPipeline;

/// Outcome of one batch part, keyed by the client-assigned index.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub index: String,
    pub name: String,
    pub file_id: Option<Uuid>,
    pub error: Option<String>,
}

/// Result of a whole batch: per-part outcomes plus whether the batch resolved
/// by count or by inactivity timeout.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub parent: String,
    pub declared_total: usize,
    pub items: BTreeMap<String, BatchItem>,
    pub timed_out: bool,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.items.values().filter(|i| i.file_id.is_some()).count()
    }
}

pub struct FolderUploadCoordinator {
    pipeline: Arc<UploadPipeline>,
    previews: Arc<PreviewChain>,
    inactivity_timeout: Duration,
}

impl FolderUploadCoordinator {
    pub fn new(
        pipeline: Arc<UploadPipeline>,
        previews: Arc<PreviewChain>,
        inactivity_timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            previews,
            inactivity_timeout,
        }
    }

    /// Ingest a batch upload request to completion.
    ///
    /// Completion is count-based: every spawned part task that finishes, in
    /// either direction, counts toward the declared total. Per-part failures
    /// are attributed to their index and never abort sibling parts. A part
    /// task that panics or is abandoned at the inactivity deadline is
    /// attributed the same way.
    pub async fn ingest_batch(
        &self,
        owner: Uuid,
        mut events: UploadEventStream,
    ) -> Result<BatchOutcome, AppError> {
        let mut outcome = BatchOutcome {
            parent: "/".to_string(),
            ..BatchOutcome::default()
        };
        let mut declared_total: Option<usize> = None;
        let mut announced: HashMap<String, FilePartMeta> = HashMap::new();
        let mut tasks: JoinSet<(String, String, Result<Uuid, AppError>)> = JoinSet::new();
        let mut in_flight: HashMap<TaskId, (String, String)> = HashMap::new();
        let mut completed: usize = 0;
        let mut transport_open = true;
        let activity = Arc::new(Mutex::new(Instant::now()));

        loop {
            if let Some(total) = declared_total {
                if completed >= total {
                    break;
                }
            }
            if !transport_open && tasks.is_empty() && declared_total.is_none() {
                break;
            }

            tokio::select! {
                event = events.next(), if transport_open => {
                    *activity.lock().unwrap() = Instant::now();
                    match event {
                        Some(UploadEvent::Field { name, value }) => match name.as_str() {
                            "total-files" => {
                                declared_total = value.parse::<usize>().ok();
                                outcome.declared_total = declared_total.unwrap_or(0);
                            }
                            "parent" => outcome.parent = value,
                            "file-data" => match serde_json::from_str::<FilePartMeta>(&value) {
                                Ok(meta) => {
                                    announced.insert(meta.index.clone(), meta);
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "Ignoring malformed file-data field");
                                }
                            },
                            _ => {}
                        },
                        Some(UploadEvent::File { name: index, content, .. }) => {
                            let Some(meta) = announced.remove(&index) else {
                                tracing::warn!(%index, "File part arrived without file-data, draining");
                                tokio::spawn(async move {
                                    let mut content = content;
                                    while content.next().await.is_some() {}
                                });
                                continue;
                            };
                            // Chunk progress counts as batch activity.
                            let pulse = Arc::clone(&activity);
                            let content: FilePartStream = Box::pin(content.inspect(move |_| {
                                *pulse.lock().unwrap() = Instant::now();
                            }));
                            let pipeline = Arc::clone(&self.pipeline);
                            let previews = Arc::clone(&self.previews);
                            let parent = outcome.parent.clone();
                            let part_index = meta.index.clone();
                            let part_name = meta.name.clone();
                            let handle = tasks.spawn(async move {
                                let result = pipeline
                                    .ingest(owner, &meta.name, &parent, meta.size, content)
                                    .await;
                                match result {
                                    Ok(record) => {
                                        let record = previews.attach_preview(record).await;
                                        (meta.index, meta.name, Ok(record.id))
                                    }
                                    Err(e) => (meta.index, meta.name, Err(e)),
                                }
                            });
                            in_flight.insert(handle.id(), (part_index, part_name));
                        }
                        None => transport_open = false,
                    }
                }
                Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    *activity.lock().unwrap() = Instant::now();
                    completed += 1;
                    match joined {
                        Ok((id, (index, name, Ok(file_id)))) => {
                            in_flight.remove(&id);
                            outcome.items.insert(index.clone(), BatchItem {
                                index,
                                name,
                                file_id: Some(file_id),
                                error: None,
                            });
                        }
                        Ok((id, (index, name, Err(e)))) => {
                            in_flight.remove(&id);
                            tracing::warn!(%index, error = %e, "Batch part failed");
                            outcome.items.insert(index.clone(), BatchItem {
                                index,
                                name,
                                file_id: None,
                                error: Some(e.to_string()),
                            });
                        }
                        Err(join_err) => {
                            tracing::error!(error = %join_err, "Batch part task failed");
                            if let Some((index, name)) = in_flight.remove(&join_err.id()) {
                                outcome.items.insert(index.clone(), BatchItem {
                                    index,
                                    name,
                                    file_id: None,
                                    error: Some(join_err.to_string()),
                                });
                            }
                        }
                    }
                }
                _ = tokio::time::sleep_until(*activity.lock().unwrap() + self.inactivity_timeout) => {
                    // A part chunk may have refreshed the window without an
                    // event reaching this loop; re-check before resolving.
                    if activity.lock().unwrap().elapsed() < self.inactivity_timeout {
                        continue;
                    }
                    tracing::warn!(
                        declared = outcome.declared_total,
                        completed,
                        "Batch inactive, resolving with partial results"
                    );
                    outcome.timed_out = true;
                    break;
                }
            }
        }

        tasks.abort_all();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, (index, name, result))) => {
                    in_flight.remove(&id);
                    let (file_id, error) = match result {
                        Ok(file_id) => (Some(file_id), None),
                        Err(e) => (None, Some(e.to_string())),
                    };
                    outcome.items.insert(index.clone(), BatchItem {
                        index,
                        name,
                        file_id,
                        error,
                    });
                }
                Err(join_err) => {
                    if let Some((index, name)) = in_flight.remove(&join_err.id()) {
                        let error = if join_err.is_cancelled() {
                            "part abandoned after batch inactivity window".to_string()
                        } else {
                            join_err.to_string()
                        };
                        outcome.items.insert(index.clone(), BatchItem {
                            index,
                            name,
                            file_id: None,
                            error: Some(error),
                        });
                    }
                }
            }
        }

        tracing::info!(
            %owner,
            declared = outcome.declared_total,
            completed = outcome.items.len(),
            succeeded = outcome.succeeded(),
            timed_out = outcome.timed_out,
            "Batch upload resolved"
        );
        Ok(outcome)
    }
}

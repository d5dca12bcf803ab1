//! Active range-stream registry.
//!
//! One entry per (file, requester): a snapshot of the file record plus the
//! cancellation handle of the pipe loop currently serving it. A new range
//! request for the same key cancels the previous loop before opening its own
//! stream, so seek-heavy playback holds at most one backend read handle per
//! viewer. Entries idle past the timeout are swept lazily on access.

use cirrus_core::models::FileRecord;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub file_id: Uuid,
    pub owner: Uuid,
}

struct Entry {
    file: FileRecord,
    cancel: CancellationToken,
    stamp: u64,
    last_used: Instant,
}

pub struct ActiveStreamRegistry {
    entries: Mutex<HashMap<StreamKey, Entry>>,
    idle_timeout: Duration,
    next_stamp: Mutex<u64>,
}

impl ActiveStreamRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_timeout,
            next_stamp: Mutex::new(0),
        }
    }

    /// Remove and return the entry for `key`, cancelling its pipe loop.
    /// Returns the cached file snapshot so the caller can skip the metadata
    /// lookup.
    pub fn take(&self, key: &StreamKey) -> Option<FileRecord> {
        let mut entries = self.entries.lock().unwrap();
        Self::sweep(&mut entries, self.idle_timeout);
        entries.remove(key).map(|entry| {
            entry.cancel.cancel();
            entry.file
        })
    }

    /// Register the pipe loop now serving `key`, replacing (and cancelling)
    /// any previous entry. Returns a stamp identifying this registration.
    pub fn insert(&self, key: StreamKey, file: FileRecord, cancel: CancellationToken) -> u64 {
        let stamp = {
            let mut next = self.next_stamp.lock().unwrap();
            *next += 1;
            *next
        };
        let mut entries = self.entries.lock().unwrap();
        Self::sweep(&mut entries, self.idle_timeout);
        if let Some(prev) = entries.insert(
            key,
            Entry {
                file,
                cancel,
                stamp,
                last_used: Instant::now(),
            },
        ) {
            prev.cancel.cancel();
        }
        stamp
    }

    /// Remove the entry for `key` only if it still belongs to `stamp`.
    /// A failing pipe loop uses this so it never evicts a successor that
    /// already replaced it.
    pub fn remove_if(&self, key: &StreamKey, stamp: u64) {
        let mut entries = self.entries.lock().unwrap();
        if entries.get(key).is_some_and(|e| e.stamp == stamp) {
            entries.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep(entries: &mut HashMap<StreamKey, Entry>, idle_timeout: Duration) {
        entries.retain(|_, entry| {
            if entry.last_used.elapsed() > idle_timeout {
                entry.cancel.cancel();
                false
            } else {
                true
            }
        });
    }
}

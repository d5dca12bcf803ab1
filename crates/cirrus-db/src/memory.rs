//! In-memory metadata store.
//!
//! Backs the transfer test-suite and deployments without a `DATABASE_URL`.
//! File lookups are counted so tests can assert that the active-stream cache
//! skips metadata queries on follow-up range requests.

use async_trait::async_trait;
use cirrus_core::models::{FileRecord, ThumbnailRecord};
use cirrus_core::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::MetadataStore;

#[derive(Default)]
struct Inner {
    files: Mutex<HashMap<Uuid, FileRecord>>,
    thumbnails: Mutex<HashMap<Uuid, ThumbnailRecord>>,
    file_lookups: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    inner: Arc<Inner>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of file lookups served so far (get_file and get_file_for_owner).
    pub fn file_lookup_count(&self) -> usize {
        self.inner.file_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create_file(&self, file: &FileRecord) -> Result<(), AppError> {
        let mut files = self.inner.files.lock().unwrap();
        if files.contains_key(&file.id) {
            return Err(AppError::Database(format!(
                "duplicate file id {}",
                file.id
            )));
        }
        files.insert(file.id, file.clone());
        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        self.inner.file_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.files.lock().unwrap().get(&id).cloned())
    }

    async fn get_file_for_owner(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<FileRecord>, AppError> {
        self.inner.file_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .inner
            .files
            .lock()
            .unwrap()
            .get(&id)
            .filter(|f| f.metadata.owner == owner)
            .cloned())
    }

    async fn find_file_by_thumbnail(
        &self,
        thumbnail_id: Uuid,
        owner: Uuid,
    ) -> Result<Option<FileRecord>, AppError> {
        Ok(self
            .inner
            .files
            .lock()
            .unwrap()
            .values()
            .find(|f| f.metadata.thumbnail_id == Some(thumbnail_id) && f.metadata.owner == owner)
            .cloned())
    }

    async fn set_thumbnail(
        &self,
        file_id: Uuid,
        thumbnail_id: Uuid,
    ) -> Result<Option<FileRecord>, AppError> {
        let mut files = self.inner.files.lock().unwrap();
        Ok(files.get_mut(&file_id).map(|f| {
            f.metadata.has_thumbnail = true;
            f.metadata.thumbnail_id = Some(thumbnail_id);
            f.clone()
        }))
    }

    async fn create_thumbnail(&self, thumbnail: &ThumbnailRecord) -> Result<(), AppError> {
        self.inner
            .thumbnails
            .lock()
            .unwrap()
            .insert(thumbnail.id, thumbnail.clone());
        Ok(())
    }

    async fn get_thumbnail_for_owner(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<ThumbnailRecord>, AppError> {
        Ok(self
            .inner
            .thumbnails
            .lock()
            .unwrap()
            .get(&id)
            .filter(|t| t.owner == owner)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(owner: Uuid) -> FileRecord {
        FileRecord::committed(
            "a.txt".to_string(),
            owner,
            "/".to_string(),
            format!("files/{}/a.txt", owner),
            3,
        )
    }

    #[tokio::test]
    async fn test_owner_scoping() {
        let store = MemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let rec = record(owner);
        store.create_file(&rec).await.unwrap();

        assert!(store.get_file_for_owner(rec.id, owner).await.unwrap().is_some());
        assert!(store.get_file_for_owner(rec.id, other).await.unwrap().is_none());
        assert!(store.get_file(rec.id).await.unwrap().is_some());
        assert_eq!(store.file_lookup_count(), 3);
    }

    #[tokio::test]
    async fn test_set_thumbnail_and_reverse_lookup() {
        let store = MemoryMetadataStore::new();
        let owner = Uuid::new_v4();
        let rec = record(owner);
        store.create_file(&rec).await.unwrap();

        let thumb_id = Uuid::new_v4();
        let updated = store.set_thumbnail(rec.id, thumb_id).await.unwrap().unwrap();
        assert!(updated.metadata.has_thumbnail);
        assert_eq!(updated.metadata.thumbnail_id, Some(thumb_id));

        let found = store
            .find_file_by_thumbnail(thumb_id, owner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, rec.id);
        assert!(store
            .find_file_by_thumbnail(thumb_id, Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = MemoryMetadataStore::new();
        let rec = record(Uuid::new_v4());
        store.create_file(&rec).await.unwrap();
        assert!(store.create_file(&rec).await.is_err());
    }
}

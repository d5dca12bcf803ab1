use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::media::is_video_filename;

/// Per-file metadata, owned by the uploading user.
///
/// `size` mirrors `FileRecord::length` and both carry the authoritative
/// post-write measurement from the storage backend, not the size the client
/// declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FileMetadata {
    pub owner: Uuid,
    pub parent: String,
    pub parent_list: Vec<String>,
    pub has_thumbnail: bool,
    pub thumbnail_id: Option<Uuid>,
    pub is_video: bool,
    pub size: i64,
    pub locator: String,
    /// True only while bytes are being written; committed records carry false.
    pub processing_file: bool,
}

/// A stored file. Created once, after its write stream finished successfully;
/// mutated later only to link a thumbnail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FileRecord {
    pub id: Uuid,
    pub filename: String,
    pub upload_date: DateTime<Utc>,
    pub length: i64,
    pub metadata: FileMetadata,
}

impl FileRecord {
    /// Build a committed record for a finished upload.
    pub fn committed(
        filename: String,
        owner: Uuid,
        parent: String,
        locator: String,
        length: i64,
    ) -> Self {
        let is_video = is_video_filename(&filename);
        FileRecord {
            id: Uuid::new_v4(),
            upload_date: Utc::now(),
            length,
            metadata: FileMetadata {
                owner,
                parent: parent.clone(),
                parent_list: vec![parent],
                has_thumbnail: false,
                thumbnail_id: None,
                is_video,
                size: length,
                locator,
                processing_file: false,
            },
            filename,
        }
    }

    pub fn owner(&self) -> Uuid {
        self.metadata.owner
    }

    pub fn locator(&self) -> &str {
        &self.metadata.locator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_committed_record_invariants() {
        let owner = Uuid::new_v4();
        let rec = FileRecord::committed(
            "clip.mp4".to_string(),
            owner,
            "/".to_string(),
            "files/x/clip.mp4".to_string(),
            1024,
        );
        assert!(rec.metadata.is_video);
        assert!(!rec.metadata.processing_file);
        assert!(!rec.metadata.has_thumbnail);
        assert_eq!(rec.metadata.thumbnail_id, None);
        assert_eq!(rec.length, rec.metadata.size);
        assert_eq!(rec.owner(), owner);
    }

    #[test]
    fn test_non_video_classification() {
        let rec = FileRecord::committed(
            "report.pdf".to_string(),
            Uuid::new_v4(),
            "/".to_string(),
            "files/x/report.pdf".to_string(),
            10,
        );
        assert!(!rec.metadata.is_video);
    }
}

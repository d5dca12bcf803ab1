use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A preview record. The locator aliases the original file's object; no
/// separate media is produced. `owner` must equal the owning file's owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThumbnailRecord {
    pub id: Uuid,
    pub name: String,
    pub owner: Uuid,
    pub locator: String,
    /// Back-reference to the owning file, non-owning.
    pub original_file: Uuid,
}

impl ThumbnailRecord {
    pub fn aliasing(name: String, owner: Uuid, locator: String, original_file: Uuid) -> Self {
        ThumbnailRecord {
            id: Uuid::new_v4(),
            name,
            owner,
            locator,
            original_file,
        }
    }
}

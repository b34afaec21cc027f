use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overview - the per-instance header record
///
/// Identity, edit version, owning type and timestamps of one persisted
/// object, kept apart from its field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    /// Unique instance identifier (UUID v4 string)
    pub uuid: String,

    /// Edit counter, bumped once per save; 0 means never saved
    pub edit_version: i32,

    /// Concrete entity type id
    pub type_id: u64,

    /// Owning instance for nested objects
    pub parent_uuid: Option<String>,

    /// Timestamp when this instance was created
    pub date_created: DateTime<Utc>,

    /// Timestamp of the latest save
    pub date_modified: DateTime<Utc>,
}

impl Overview {
    /// Create a fresh, never-saved overview for the given type
    pub fn new(type_id: u64) -> Self {
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4().to_string(),
            edit_version: 0,
            type_id,
            parent_uuid: None,
            date_created: now,
            date_modified: now,
        }
    }

    /// `(uuid, edit_version)` composite key
    pub fn key(&self) -> (String, i32) {
        (self.uuid.clone(), self.edit_version)
    }

    pub fn is_persisted(&self) -> bool {
        self.edit_version > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_overview_is_unsaved() {
        let overview = Overview::new(42);
        assert_eq!(overview.type_id, 42);
        assert_eq!(overview.edit_version, 0);
        assert!(!overview.is_persisted());
        assert!(Uuid::parse_str(&overview.uuid).is_ok());
    }

    #[test]
    fn test_overviews_get_distinct_uuids() {
        assert_ne!(Overview::new(1).uuid, Overview::new(1).uuid);
    }
}

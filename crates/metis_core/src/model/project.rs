//! Project and template metadata records.
//!
//! # Responsibility
//! - Define the persisted metadata shapes owned by the repository layer.
//! - Provide status helpers for the soft-delete lifecycle.
//!
//! # Invariants
//! - `owner` never changes after creation.
//! - `status` only moves `created -> deleted`.
//! - `deleted_at` is `Some` exactly when `status == Deleted`.

use crate::model::id::EntityId;
use serde::{Deserialize, Serialize};

/// Identifier of a project. Also the document name in the document service.
pub type ProjectId = EntityId;

/// Identifier of a stored template.
pub type TemplateId = EntityId;

/// Lifecycle state of a project row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Created,
    Deleted,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Metadata of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: ProjectId,
    pub name: String,
    /// Caller identity that created the project.
    pub owner: String,
    pub status: ProjectStatus,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds, set by soft delete.
    pub deleted_at: Option<i64>,
}

impl ProjectInfo {
    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Created
    }

    /// Returns whether the status/deleted_at pair is consistent.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            ProjectStatus::Created => self.deleted_at.is_none(),
            ProjectStatus::Deleted => self.deleted_at.is_some(),
        }
    }
}

/// Stored project template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub id: TemplateId,
    pub name: String,
    pub owner: String,
    /// JSON-encoded content tree.
    pub contents: String,
    pub created_at: i64,
}

/// Current time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{ProjectInfo, ProjectStatus};
    use crate::model::id::EntityId;

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [ProjectStatus::Created, ProjectStatus::Deleted] {
            assert_eq!(ProjectStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProjectStatus::parse("pending"), None);
    }

    #[test]
    fn deleted_project_without_timestamp_is_inconsistent() {
        let info = ProjectInfo {
            id: EntityId::generate(),
            name: "p".to_string(),
            owner: "KR18401".to_string(),
            status: ProjectStatus::Deleted,
            created_at: 1,
            deleted_at: None,
        };
        assert!(!info.is_consistent());
        assert!(!info.is_active());
    }
}

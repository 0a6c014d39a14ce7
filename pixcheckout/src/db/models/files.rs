//! Database models for stored files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::types::FileId;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct StoredFile {
    #[schema(value_type = String, format = "uuid")]
    pub id: FileId,
    pub bucket: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn parsed_metadata(&self) -> FileMetadata {
        serde_json::from_value(self.metadata.clone()).unwrap_or_default()
    }
}

/// User-supplied description of a file, stored in the `metadata` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct FileMetadata {
    pub original_name: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub related_id: Option<String>,
    pub related_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileCreateDBRequest {
    pub bucket: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    pub metadata: FileMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub skip: i64,
    pub limit: i64,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub related_id: Option<String>,
    pub tag: Option<String>,
}

//! Stored file listing and metadata payloads.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::models::pagination::Pagination,
    db::models::files::{FileFilter, FileMetadata},
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListFilesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    /// Bucket, e.g. `uploads`, `reports` or `backups`
    pub bucket: Option<String>,
    /// Path prefix within the bucket
    pub prefix: Option<String>,
    pub related_id: Option<String>,
    pub tag: Option<String>,
}

impl ListFilesQuery {
    pub fn filter(self) -> FileFilter {
        let (skip, limit) = self.pagination.params();
        FileFilter {
            skip,
            limit,
            bucket: self.bucket,
            prefix: self.prefix,
            related_id: self.related_id,
            tag: self.tag,
        }
    }
}

/// Partial metadata update. For the nullable fields, an explicit `null` clears the value and an
/// absent field leaves it unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FileMetadataUpdate {
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub related_id: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub related_type: Option<Option<String>>,
}

impl FileMetadataUpdate {
    pub fn apply(self, mut metadata: FileMetadata) -> FileMetadata {
        if let Some(description) = self.description {
            metadata.description = description;
        }
        if let Some(tags) = self.tags {
            metadata.tags = tags;
        }
        if let Some(related_id) = self.related_id {
            metadata.related_id = related_id;
        }
        if let Some(related_type) = self.related_type {
            metadata.related_type = related_type;
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_update_merges() {
        let current = FileMetadata {
            original_name: Some("nota.pdf".to_string()),
            description: Some("Nota fiscal".to_string()),
            tags: vec!["fiscal".to_string()],
            related_id: Some("abc".to_string()),
            related_type: Some("orders".to_string()),
        };
        let update: FileMetadataUpdate = serde_json::from_str(r#"{"description": null, "tags": ["a", "b"]}"#).unwrap();

        let merged = update.apply(current);
        assert_eq!(merged.description, None);
        assert_eq!(merged.tags, vec!["a", "b"]);
        assert_eq!(merged.related_id.as_deref(), Some("abc"));
        assert_eq!(merged.original_name.as_deref(), Some("nota.pdf"));
    }
}

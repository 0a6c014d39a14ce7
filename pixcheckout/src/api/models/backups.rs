use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::backups::BackupTable;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BackupCreateRequest {
    /// Tables to include; every table when empty
    #[serde(default)]
    pub tables: Vec<BackupTable>,
}

/// Restore a backup already stored in the backups bucket.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RestoreRequest {
    pub file_name: String,
}

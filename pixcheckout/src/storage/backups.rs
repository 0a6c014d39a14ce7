//! Table backups as JSON documents in the `backups` bucket.
//!
//! A backup is `{"version": "1.0", "timestamp": ..., "data": {table: [rows]}}`. Restoring
//! replaces the content of every table present in the document inside one transaction: rows
//! are deleted in reverse dependency order and inserted in dependency order. A restore that
//! would cascade into a non-empty table missing from the document is refused.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Acquire;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    AppState,
    db::{
        handlers::{Backups, file_storage::FileStorage},
        models::{
            backups::{BackupLog, BackupLogCreateDBRequest, BackupOperation, BackupTable},
            file_storage::FileStorageRequest,
        },
    },
    errors::{Error, Result},
};

pub const BACKUPS_BUCKET: &str = "backups";
pub const BACKUP_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BackupDocument {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub data: BTreeMap<BackupTable, Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BackupResult {
    pub file_name: String,
    pub size: i64,
    pub tables: Vec<BackupTable>,
}

pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!("backup-{}.json", at.format("%Y-%m-%d-%H-%M"))
}

fn table_names(tables: &[BackupTable]) -> Vec<String> {
    tables.iter().map(|t| t.as_str().to_string()).collect()
}

/// Selected tables, deduplicated and in restore order. Empty selects every table.
fn normalize(tables: &[BackupTable]) -> Vec<BackupTable> {
    if tables.is_empty() {
        return BackupTable::ALL.to_vec();
    }
    BackupTable::ALL.into_iter().filter(|t| tables.contains(t)).collect()
}

async fn write_log(state: &AppState, request: BackupLogCreateDBRequest) -> Result<BackupLog> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Backups::new(&mut conn).log(&request).await?)
}

async fn dump(state: &AppState, tables: &[BackupTable], now: DateTime<Utc>) -> Result<BackupResult> {
    let mut data = BTreeMap::new();
    {
        // One snapshot across all tables
        let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.into()))?;
        for table in tables {
            let rows = Backups::new(&mut tx).dump_table(*table).await?;
            data.insert(*table, rows);
        }
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    }

    let document = BackupDocument {
        version: BACKUP_VERSION.to_string(),
        timestamp: now,
        data,
    };
    let content = serde_json::to_vec_pretty(&document).map_err(|e| Error::Internal {
        operation: format!("serialize backup: {e}"),
    })?;

    let file_name = backup_file_name(now);
    let stored = state
        .storage
        .store(FileStorageRequest {
            bucket: BACKUPS_BUCKET.to_string(),
            path: file_name.clone(),
            content,
            content_type: "application/json".to_string(),
        })
        .await?;

    Ok(BackupResult {
        file_name,
        size: stored.size,
        tables: tables.to_vec(),
    })
}

/// Write a backup of `tables` (every table when empty). The attempt is logged either way.
#[instrument(skip(state), err)]
pub async fn create_backup(state: &AppState, tables: &[BackupTable]) -> Result<BackupResult> {
    let tables = normalize(tables);
    let now = Utc::now();
    let outcome = dump(state, &tables, now).await;

    write_log(
        state,
        BackupLogCreateDBRequest {
            operation: BackupOperation::Backup,
            success: outcome.is_ok(),
            file_name: Some(backup_file_name(now)),
            file_size: outcome.as_ref().ok().map(|r| r.size),
            tables: table_names(&tables),
            error: outcome.as_ref().err().map(ToString::to_string),
        },
    )
    .await?;

    if let Ok(result) = &outcome {
        info!(file = %result.file_name, size = result.size, "Backup created");
    }
    outcome
}

/// Parse and check a backup document.
pub fn parse_document(content: &[u8]) -> Result<BackupDocument> {
    let value: serde_json::Value = serde_json::from_slice(content).map_err(|_| Error::BadRequest {
        message: "Invalid backup file format".to_string(),
    })?;

    let has_fields = value.get("version").is_some_and(|v| v.is_string())
        && value.get("timestamp").is_some_and(|v| v.is_string())
        && value.get("data").is_some_and(|v| v.is_object());
    if !has_fields {
        return Err(Error::BadRequest {
            message: "Invalid backup file format".to_string(),
        });
    }

    let document: BackupDocument = serde_json::from_value(value).map_err(|e| Error::BadRequest {
        message: format!("Invalid backup file format: {e}"),
    })?;
    if document.version != BACKUP_VERSION {
        return Err(Error::BadRequest {
            message: format!("Unsupported backup version: {}", document.version),
        });
    }
    Ok(document)
}

async fn apply(state: &AppState, document: &BackupDocument) -> Result<()> {
    let tables: Vec<BackupTable> = normalize(&document.data.keys().copied().collect::<Vec<_>>());

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let conn = tx.acquire().await.map_err(|e| Error::Database(e.into()))?;

    for table in &tables {
        for dependent in table.dependents().iter().filter(|d| !tables.contains(d)) {
            if Backups::new(&mut *conn).row_count(*dependent).await? > 0 {
                return Err(Error::BadRequest {
                    message: format!(
                        "Restoring {} would discard rows in {}, which is not in the backup",
                        table.as_str(),
                        dependent.as_str()
                    ),
                });
            }
        }
    }

    for table in tables.iter().rev() {
        Backups::new(&mut *conn).clear_table(*table).await?;
    }
    for table in &tables {
        let rows = document.data.get(table).map(Vec::as_slice).unwrap_or_default();
        Backups::new(&mut *conn).insert_rows(*table, rows).await?;
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(())
}

/// Restore from an uploaded backup document. Nothing changes unless every table restores.
#[instrument(skip(state, content), fields(size = content.len()), err)]
pub async fn restore(state: &AppState, file_name: Option<String>, content: &[u8]) -> Result<BackupLog> {
    let outcome = match parse_document(content) {
        Ok(document) => apply(state, &document).await.map(|_| document),
        Err(e) => Err(e),
    };

    let tables = outcome
        .as_ref()
        .map(|d| table_names(&normalize(&d.data.keys().copied().collect::<Vec<_>>())))
        .unwrap_or_default();
    let log = write_log(
        state,
        BackupLogCreateDBRequest {
            operation: BackupOperation::Restore,
            success: outcome.is_ok(),
            file_name,
            file_size: Some(content.len() as i64),
            tables,
            error: outcome.as_ref().err().map(|e| e.user_message()),
        },
    )
    .await?;

    match outcome {
        Ok(document) => {
            info!(timestamp = %document.timestamp, tables = document.data.len(), "Backup restored");
            Ok(log)
        }
        Err(e) => Err(e),
    }
}

/// Restore a backup previously written to the backups bucket.
#[instrument(skip(state), err)]
pub async fn restore_stored(state: &AppState, file_name: &str) -> Result<BackupLog> {
    let content = state
        .storage
        .retrieve(&format!("{BACKUPS_BUCKET}/{file_name}"))
        .await
        .map_err(|_| Error::NotFound {
            resource: "Backup".to_string(),
            id: file_name.to_string(),
        })?;
    restore(state, Some(file_name.to_string()), &content).await
}

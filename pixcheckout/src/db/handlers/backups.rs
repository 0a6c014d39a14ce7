//! Database access for backups: table dumps, transactional restores and the backup log.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::Result,
    models::backups::{BackupLog, BackupLogCreateDBRequest, BackupTable},
};

pub struct Backups<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Backups<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// All rows of `table` as a JSON array.
    #[instrument(skip(self), fields(table = table.as_str()), err)]
    pub async fn dump_table(&mut self, table: BackupTable) -> Result<Vec<serde_json::Value>> {
        let query = format!("SELECT COALESCE(jsonb_agg(t), '[]'::jsonb) FROM {} t", table.as_str());
        let rows = sqlx::query_scalar::<_, serde_json::Value>(&query)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(match rows {
            serde_json::Value::Array(rows) => rows,
            _ => Vec::new(),
        })
    }

    #[instrument(skip(self), fields(table = table.as_str()), err)]
    pub async fn row_count(&mut self, table: BackupTable) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM {}", table.as_str());
        Ok(sqlx::query_scalar::<_, i64>(&query).fetch_one(&mut *self.db).await?)
    }

    #[instrument(skip(self), fields(table = table.as_str()), err)]
    pub async fn clear_table(&mut self, table: BackupTable) -> Result<u64> {
        let query = format!("DELETE FROM {}", table.as_str());
        let result = sqlx::query(&query).execute(&mut *self.db).await?;
        Ok(result.rows_affected())
    }

    /// Insert `rows` (objects keyed by column name) into `table`.
    #[instrument(skip(self, rows), fields(table = table.as_str(), rows = rows.len()), err)]
    pub async fn insert_rows(&mut self, table: BackupTable, rows: &[serde_json::Value]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let query = format!(
            "INSERT INTO {table} SELECT * FROM jsonb_populate_recordset(NULL::{table}, $1)",
            table = table.as_str()
        );
        let result = sqlx::query(&query)
            .bind(serde_json::Value::Array(rows.to_vec()))
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, request), fields(operation = request.operation.as_str(), success = request.success), err)]
    pub async fn log(&mut self, request: &BackupLogCreateDBRequest) -> Result<BackupLog> {
        let log = sqlx::query_as::<_, BackupLog>(
            r#"
            INSERT INTO backup_logs (id, type, status, file_name, file_size, tables, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.operation.as_str())
        .bind(if request.success { "success" } else { "failed" })
        .bind(&request.file_name)
        .bind(request.file_size)
        .bind(&request.tables)
        .bind(&request.error)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(log)
    }

    #[instrument(skip(self), err)]
    pub async fn list_logs(&mut self, skip: i64, limit: i64) -> Result<Vec<BackupLog>> {
        let logs = sqlx::query_as::<_, BackupLog>("SELECT * FROM backup_logs ORDER BY created_at DESC OFFSET $1 LIMIT $2")
            .bind(skip)
            .bind(limit)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::backups::BackupOperation;
    use crate::test_utils::create_test_product;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_dump_clear_and_reinsert(pool: PgPool) {
        let product = create_test_product(&pool, Decimal::new(4990, 2)).await;
        let mut tx = pool.begin().await.unwrap();
        let mut repo = Backups::new(&mut tx);

        let rows = repo.dump_table(BackupTable::Products).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], product.name.as_str());

        assert_eq!(repo.clear_table(BackupTable::Products).await.unwrap(), 1);
        assert!(repo.dump_table(BackupTable::Products).await.unwrap().is_empty());

        assert_eq!(repo.insert_rows(BackupTable::Products, &rows).await.unwrap(), 1);
        let restored = repo.dump_table(BackupTable::Products).await.unwrap();
        assert_eq!(restored, rows);
        tx.commit().await.unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_settings_round_trip(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Backups::new(&mut conn);

        let rows = repo.dump_table(BackupTable::Settings).await.unwrap();
        assert_eq!(rows.len(), 1);
        repo.clear_table(BackupTable::Settings).await.unwrap();
        repo.insert_rows(BackupTable::Settings, &rows).await.unwrap();
        assert_eq!(repo.dump_table(BackupTable::Settings).await.unwrap(), rows);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_backup_log(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Backups::new(&mut conn);

        let log = repo
            .log(&BackupLogCreateDBRequest {
                operation: BackupOperation::Backup,
                success: true,
                file_name: Some("backup-2025-01-01-00-00.json".to_string()),
                file_size: Some(120),
                tables: vec!["products".to_string()],
                error: None,
            })
            .await
            .unwrap();
        assert_eq!(log.operation, "backup");
        assert_eq!(log.status, "success");
        assert_eq!(repo.list_logs(0, 10).await.unwrap().len(), 1);
    }
}

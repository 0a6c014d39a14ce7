//! Database repository for stored file metadata.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result},
    models::files::{FileCreateDBRequest, FileFilter, FileMetadata, StoredFile},
};
use crate::types::{FileId, abbrev_uuid};

pub struct Files<'c> {
    db: &'c mut PgConnection,
}

const FILTER_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL OR bucket = $1)
      AND ($2::text IS NULL OR path LIKE $2 || '%')
      AND ($3::text IS NULL OR metadata->>'related_id' = $3)
      AND ($4::text IS NULL OR metadata->'tags' ? $4)
"#;

impl<'c> Files<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(bucket = %request.bucket, path = %request.path), err)]
    pub async fn create(&mut self, request: &FileCreateDBRequest) -> Result<StoredFile> {
        let metadata = serde_json::to_value(&request.metadata).map_err(anyhow::Error::from)?;
        let file = sqlx::query_as::<_, StoredFile>(
            r#"
            INSERT INTO files (id, bucket, path, size, mime_type, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.bucket)
        .bind(&request.path)
        .bind(request.size)
        .bind(&request.mime_type)
        .bind(metadata)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(file)
    }

    #[instrument(skip(self), fields(file_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: FileId) -> Result<Option<StoredFile>> {
        let file = sqlx::query_as::<_, StoredFile>("SELECT * FROM files WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(file)
    }

    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    pub async fn list(&mut self, filter: &FileFilter) -> Result<Vec<StoredFile>> {
        let query = format!("SELECT * FROM files {FILTER_CLAUSE} ORDER BY created_at DESC OFFSET $5 LIMIT $6");
        let files = sqlx::query_as::<_, StoredFile>(&query)
            .bind(filter.bucket.as_deref())
            .bind(filter.prefix.as_deref())
            .bind(filter.related_id.as_deref())
            .bind(filter.tag.as_deref())
            .bind(filter.skip)
            .bind(filter.limit)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(files)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &FileFilter) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM files {FILTER_CLAUSE}");
        let count = sqlx::query_scalar::<_, i64>(&query)
            .bind(filter.bucket.as_deref())
            .bind(filter.prefix.as_deref())
            .bind(filter.related_id.as_deref())
            .bind(filter.tag.as_deref())
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    #[instrument(skip(self, metadata), fields(file_id = %abbrev_uuid(&id)), err)]
    pub async fn update_metadata(&mut self, id: FileId, metadata: &FileMetadata) -> Result<StoredFile> {
        let metadata = serde_json::to_value(metadata).map_err(anyhow::Error::from)?;
        let file = sqlx::query_as::<_, StoredFile>("UPDATE files SET metadata = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(metadata)
            .fetch_optional(&mut *self.db)
            .await?;

        file.ok_or(DbError::NotFound)
    }

    /// Delete the row and return it so the caller can remove the stored object.
    #[instrument(skip(self), fields(file_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: FileId) -> Result<Option<StoredFile>> {
        let file = sqlx::query_as::<_, StoredFile>("DELETE FROM files WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn upload(path: &str, related_id: &str, tags: &[&str]) -> FileCreateDBRequest {
        FileCreateDBRequest {
            bucket: "uploads".to_string(),
            path: path.to_string(),
            size: 10,
            mime_type: "image/png".to_string(),
            metadata: FileMetadata {
                original_name: Some("comprovante.png".to_string()),
                description: None,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                related_id: Some(related_id.to_string()),
                related_type: Some("orders".to_string()),
            },
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_filters(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Files::new(&mut conn);

        repo.create(&upload("orders/a.png", "o1", &["receipt"])).await.unwrap();
        repo.create(&upload("orders/b.png", "o2", &["receipt", "refund"])).await.unwrap();
        repo.create(&upload("products/c.png", "p1", &[])).await.unwrap();

        let by_prefix = FileFilter {
            limit: 10,
            prefix: Some("orders/".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.count(&by_prefix).await.unwrap(), 2);

        let by_tag = FileFilter {
            limit: 10,
            tag: Some("refund".to_string()),
            ..Default::default()
        };
        let tagged = repo.list(&by_tag).await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].path, "orders/b.png");

        let by_related = FileFilter {
            limit: 10,
            related_id: Some("p1".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.count(&by_related).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_path_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Files::new(&mut conn);

        repo.create(&upload("orders/a.png", "o1", &[])).await.unwrap();
        let err = repo.create(&upload("orders/a.png", "o1", &[])).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_metadata_and_delete(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Files::new(&mut conn);

        let file = repo.create(&upload("orders/a.png", "o1", &[])).await.unwrap();
        let updated = repo
            .update_metadata(
                file.id,
                &FileMetadata {
                    description: Some("Comprovante".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.metadata["description"], "Comprovante");

        let deleted = repo.delete(file.id).await.unwrap().unwrap();
        assert_eq!(deleted.path, "orders/a.png");
        assert!(repo.delete(file.id).await.unwrap().is_none());
    }
}

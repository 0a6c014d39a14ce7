//! Stored files: objects in a [`FileStorage`] backend plus one `files` row each.
//!
//! - [`backups`]: JSON snapshots of selected tables and transactional restore

pub mod backups;

use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    config::Config,
    db::{
        handlers::{
            Files,
            file_storage::{FileStorage, storage_key},
        },
        models::{
            file_storage::FileStorageRequest,
            files::{FileMetadata, StoredFile},
        },
    },
    errors::{Error, Result},
    types::FileId,
};

pub const UPLOADS_BUCKET: &str = "uploads";

/// Admin API link to a file's content.
pub fn download_url(config: &Config, id: FileId) -> String {
    format!("{}/admin/api/v1/files/{id}/download", config.public_url.as_str().trim_end_matches('/'))
}

/// Path of a new upload: `{related_type}/{uuid}.{ext}`, `general/` when unrelated.
pub fn upload_path(related_type: Option<&str>, original_name: &str) -> String {
    let folder = related_type
        .map(|t| t.trim().trim_matches('/'))
        .filter(|t| !t.is_empty() && !t.contains(['/', '\\', '.']))
        .unwrap_or("general");
    let extension = std::path::Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{folder}/{}{extension}", Uuid::new_v4())
}

/// Store an object and record it. The object is removed again if the row cannot be written.
#[instrument(skip(state, request, metadata), fields(bucket = %request.bucket, path = %request.path), err)]
pub async fn save_file(state: &AppState, request: FileStorageRequest, metadata: FileMetadata) -> Result<StoredFile> {
    let (bucket, path, mime_type) = (request.bucket.clone(), request.path.clone(), request.content_type.clone());
    let stored = state.storage.store(request).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let created = Files::new(&mut conn)
        .create(&crate::db::models::files::FileCreateDBRequest {
            bucket,
            path,
            size: stored.size,
            mime_type,
            metadata,
        })
        .await;

    match created {
        Ok(file) => Ok(file),
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&stored.storage_key).await {
                tracing::warn!(key = %stored.storage_key, error = %cleanup, "Failed to remove orphaned object");
            }
            Err(e.into())
        }
    }
}

/// Validate and store an uploaded file in the uploads bucket.
#[instrument(skip(state, content, metadata), fields(size = content.len()), err)]
pub async fn upload(state: &AppState, content: Vec<u8>, content_type: Option<String>, metadata: FileMetadata) -> Result<StoredFile> {
    let max = state.config.limits.files.max_file_size;
    if max > 0 && content.len() as u64 > max {
        return Err(Error::PayloadTooLarge {
            message: format!("File exceeds the maximum size of {max} bytes"),
        });
    }
    if content.is_empty() {
        return Err(Error::BadRequest {
            message: "File is empty".to_string(),
        });
    }

    let original_name = metadata.original_name.clone().unwrap_or_else(|| "file".to_string());
    let content_type = content_type
        .filter(|c| !c.is_empty() && c != "application/octet-stream")
        .unwrap_or_else(|| mime_guess::from_path(&original_name).first_or_octet_stream().to_string());

    save_file(
        state,
        FileStorageRequest {
            bucket: UPLOADS_BUCKET.to_string(),
            path: upload_path(metadata.related_type.as_deref(), &original_name),
            content,
            content_type,
        },
        metadata,
    )
    .await
}

fn file_not_found(id: FileId) -> Error {
    Error::NotFound {
        resource: "File".to_string(),
        id: id.to_string(),
    }
}

/// A file row and its content.
#[instrument(skip(state), err)]
pub async fn download(state: &AppState, id: FileId) -> Result<(StoredFile, Vec<u8>)> {
    let file = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Files::new(&mut conn).get_by_id(id).await?.ok_or_else(|| file_not_found(id))?
    };
    let content = state.storage.retrieve(&storage_key(&file.bucket, &file.path)).await?;
    Ok((file, content))
}

/// Delete the row, then the object.
#[instrument(skip(state), err)]
pub async fn delete(state: &AppState, id: FileId) -> Result<StoredFile> {
    let file = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Files::new(&mut conn).delete(id).await?.ok_or_else(|| file_not_found(id))?
    };
    state.storage.delete(&storage_key(&file.bucket, &file.path)).await?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_state;
    use sqlx::PgPool;

    #[test]
    fn test_upload_path() {
        let path = upload_path(Some("orders"), "Comprovante.PDF");
        assert!(path.starts_with("orders/"));
        assert!(path.ends_with(".pdf"));

        assert!(upload_path(None, "notes").starts_with("general/"));
        assert!(!upload_path(None, "notes").contains('.'));
        assert!(upload_path(Some("../etc"), "a.txt").starts_with("general/"));
        assert!(upload_path(Some("  "), "a.txt").starts_with("general/"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_download_delete(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let metadata = FileMetadata {
            original_name: Some("recibo.txt".to_string()),
            tags: vec!["recibo".to_string()],
            related_id: Some("order-1".to_string()),
            related_type: Some("orders".to_string()),
            ..Default::default()
        };

        let file = upload(&state, b"ola".to_vec(), None, metadata.clone()).await.unwrap();
        assert_eq!(file.bucket, UPLOADS_BUCKET);
        assert_eq!(file.size, 3);
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(serde_json::from_value::<FileMetadata>(file.metadata.clone()).unwrap(), metadata);

        let (found, content) = download(&state, file.id).await.unwrap();
        assert_eq!(found.id, file.id);
        assert_eq!(content, b"ola");

        delete(&state, file.id).await.unwrap();
        assert!(matches!(download(&state, file.id).await.unwrap_err(), Error::NotFound { .. }));
        assert!(!state.storage.exists(&storage_key(&file.bucket, &file.path)).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_limits(pool: PgPool) {
        let mut state = create_test_state(pool).await;
        state.config.limits.files.max_file_size = 4;

        let err = upload(&state, vec![0; 5], None, FileMetadata::default()).await.unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { .. }));

        let err = upload(&state, Vec::new(), None, FileMetadata::default()).await.unwrap_err();
        assert_eq!(err.user_message(), "File is empty");
    }

    #[test]
    fn test_download_url() {
        let config = Config::default();
        let id = Uuid::nil();
        assert_eq!(
            download_url(&config, id),
            "http://localhost:3001/admin/api/v1/files/00000000-0000-0000-0000-000000000000/download"
        );
    }
}

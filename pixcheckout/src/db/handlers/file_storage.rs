use crate::db::{
    errors::{DbError, Result},
    models::file_storage::{FileStorageRequest, FileStorageResponse},
};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Trait for object storage backends
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store object content and return its storage key
    async fn store(&self, request: FileStorageRequest) -> Result<FileStorageResponse>;

    /// Retrieve object content using storage key
    async fn retrieve(&self, storage_key: &str) -> Result<Vec<u8>>;

    /// Delete object content using storage key. Deleting a missing object is not an error.
    async fn delete(&self, storage_key: &str) -> Result<()>;

    /// Check if an object exists using storage key
    async fn exists(&self, storage_key: &str) -> Result<bool>;
}

/// Join bucket and path into a storage key.
pub fn storage_key(bucket: &str, path: &str) -> String {
    format!("{}/{}", bucket.trim_matches('/'), path.trim_start_matches('/'))
}

/// Local filesystem storage backend, one directory per bucket under `base_path`.
pub struct LocalFileStorage {
    base_path: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Resolve a storage key below the base path, rejecting anything that would escape it.
    fn resolve(&self, storage_key: &str) -> Result<PathBuf> {
        let relative = Path::new(storage_key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if storage_key.is_empty() || escapes {
            return Err(DbError::Other(anyhow::anyhow!("Invalid storage key: {storage_key}")));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, request: FileStorageRequest) -> Result<FileStorageResponse> {
        let key = storage_key(&request.bucket, &request.path);
        let full_path = self.resolve(&key)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&request.content).await?;
        file.sync_all().await?;

        Ok(FileStorageResponse {
            storage_key: key,
            size: request.content.len() as i64,
        })
    }

    async fn retrieve(&self, storage_key: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(storage_key)?;

        let mut file = fs::File::open(&full_path).await?;
        let mut content = Vec::new();
        file.read_to_end(&mut content).await?;

        Ok(content)
    }

    async fn delete(&self, storage_key: &str) -> Result<()> {
        let full_path = self.resolve(storage_key)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, storage_key: &str) -> Result<bool> {
        let full_path = self.resolve(storage_key)?;
        Ok(fs::try_exists(&full_path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(bucket: &str, path: &str, content: &[u8]) -> FileStorageRequest {
        FileStorageRequest {
            bucket: bucket.to_string(),
            path: path.to_string(),
            content: content.to_vec(),
            content_type: "application/octet-stream".to_string(),
        }
    }

    #[tokio::test]
    async fn test_local_storage_lifecycle() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf());

        let stored = storage.store(request("uploads", "orders/a.txt", b"hello")).await.unwrap();
        assert_eq!(stored.storage_key, "uploads/orders/a.txt");
        assert_eq!(stored.size, 5);
        assert!(dir.path().join("uploads/orders/a.txt").exists());

        assert!(storage.exists(&stored.storage_key).await.unwrap());
        assert_eq!(storage.retrieve(&stored.storage_key).await.unwrap(), b"hello");

        storage.delete(&stored.storage_key).await.unwrap();
        assert!(!storage.exists(&stored.storage_key).await.unwrap());
        // Idempotent
        storage.delete(&stored.storage_key).await.unwrap();
    }

    #[tokio::test]
    async fn test_retrieve_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf());

        assert!(matches!(storage.retrieve("uploads/missing.bin").await, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::new(dir.path().to_path_buf());

        assert!(storage.store(request("uploads", "../../etc/passwd", b"x")).await.is_err());
        assert!(storage.retrieve("/etc/passwd").await.is_err());
        assert!(storage.exists("uploads/../../x").await.is_err());
    }

    #[test]
    fn test_storage_key() {
        assert_eq!(storage_key("reports", "daily-2025.csv"), "reports/daily-2025.csv");
        assert_eq!(storage_key("/backups/", "/b.json"), "backups/b.json");
    }
}

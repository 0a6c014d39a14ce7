/// Request to store object content
#[derive(Debug, Clone)]
pub struct FileStorageRequest {
    /// Top-level namespace, e.g. `uploads`, `reports` or `backups`
    pub bucket: String,
    /// Path inside the bucket, e.g. `orders/3f2c....pdf`
    pub path: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

/// Response from storing object content
#[derive(Debug, Clone)]
pub struct FileStorageResponse {
    /// Storage key to save in database, `{bucket}/{path}`
    pub storage_key: String,
    pub size: i64,
}

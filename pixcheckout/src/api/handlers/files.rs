//! File upload, listing, download and metadata.
//!
//! Uploads are buffered in memory up to `limits.files.max_file_size` and gated by the upload
//! limiter, so a burst of large uploads queues instead of exhausting memory.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::{
    AppState,
    api::models::{
        files::{FileMetadataUpdate, ListFilesQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, operation, resource},
    db::{
        handlers::Files,
        models::files::{FileMetadata, StoredFile},
    },
    errors::{Error, Result},
    storage,
    types::FileId,
};

fn multipart_error(e: impl std::fmt::Display) -> Error {
    Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    }
}

fn optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[utoipa::path(
    post,
    path = "/files",
    tag = "files",
    summary = "Upload file",
    description = "Multipart upload with a `file` part and optional `description`, `tags` (comma separated), \
                   `related_id` and `related_type` fields.",
    request_body(content_type = "multipart/form-data", description = "File and metadata"),
    responses(
        (status = 201, description = "File stored", body = StoredFile),
        (status = 400, description = "Missing or empty file"),
        (status = 413, description = "File too large"),
        (status = 429, description = "Too many uploads in progress"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn upload_file(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Files, operation::CreateAll>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>)> {
    let _permit = match &state.limiters.file_uploads {
        Some(limiter) => Some(limiter.acquire().await?),
        None => None,
    };

    let max_file_size = state.config.limits.files.max_file_size;
    let mut metadata = FileMetadata::default();
    let mut content: Option<(Vec<u8>, Option<String>)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                metadata.original_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let mut buffer = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    buffer.extend_from_slice(&chunk);
                    // Fail fast instead of buffering the whole body first
                    if max_file_size > 0 && buffer.len() as u64 > max_file_size {
                        return Err(Error::PayloadTooLarge {
                            message: format!("File exceeds the maximum size of {max_file_size} bytes"),
                        });
                    }
                }
                content = Some((buffer, content_type));
            }
            "description" => metadata.description = optional_text(field.text().await.map_err(multipart_error)?),
            "tags" => {
                metadata.tags = field
                    .text()
                    .await
                    .map_err(multipart_error)?
                    .split(',')
                    .filter_map(|t| optional_text(t.to_string()))
                    .collect();
            }
            "related_id" => metadata.related_id = optional_text(field.text().await.map_err(multipart_error)?),
            "related_type" => metadata.related_type = optional_text(field.text().await.map_err(multipart_error)?),
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let (bytes, content_type) = content.ok_or_else(|| Error::BadRequest {
        message: "No file provided".to_string(),
    })?;
    let file = storage::upload(&state, bytes, content_type, metadata).await?;
    tracing::info!(file_id = %file.id, size = file.size, "Stored upload");

    Ok((StatusCode::CREATED, Json(file)))
}

#[utoipa::path(
    get,
    path = "/files",
    tag = "files",
    params(ListFilesQuery),
    responses((status = 200, description = "Paginated files", body = PaginatedResponse<StoredFile>)),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListFilesQuery>,
    _: RequiresPermission<resource::Files, operation::ReadAll>,
) -> Result<Json<PaginatedResponse<StoredFile>>> {
    let filter = query.filter();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Files::new(&mut conn);
    let files = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(files, total, filter.skip, filter.limit)))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    tag = "files",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "File record", body = StoredFile),
        (status = 404, description = "File not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %id))]
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
    _: RequiresPermission<resource::Files, operation::ReadAll>,
) -> Result<Json<StoredFile>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let file = Files::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "File".to_string(),
        id: id.to_string(),
    })?;
    Ok(Json(file))
}

#[utoipa::path(
    get,
    path = "/files/{id}/download",
    tag = "files",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "File content"),
        (status = 404, description = "File not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %id))]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
    _: RequiresPermission<resource::Files, operation::ReadAll>,
) -> Result<impl IntoResponse> {
    let (file, content) = storage::download(&state, id).await?;
    let file_name = file
        .parsed_metadata()
        .original_name
        .unwrap_or_else(|| file.path.rsplit('/').next().unwrap_or("file").to_string())
        .replace('"', "");

    Ok((
        [
            (header::CONTENT_TYPE, file.mime_type),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
        ],
        content,
    ))
}

#[utoipa::path(
    patch,
    path = "/files/{id}",
    tag = "files",
    request_body = FileMetadataUpdate,
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "Metadata updated", body = StoredFile),
        (status = 404, description = "File not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %id))]
pub async fn update_file_metadata(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
    _: RequiresPermission<resource::Files, operation::UpdateAll>,
    Json(request): Json<FileMetadataUpdate>,
) -> Result<Json<StoredFile>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Files::new(&mut conn);
    let file = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "File".to_string(),
        id: id.to_string(),
    })?;

    let metadata = request.apply(file.parsed_metadata());
    let updated = repo.update_metadata(id, &metadata).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    tag = "files",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 204, description = "File and stored object deleted"),
        (status = 404, description = "File not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %id))]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
    _: RequiresPermission<resource::Files, operation::DeleteAll>,
) -> Result<StatusCode> {
    storage::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{admin_cookie, create_test_admin_user, create_test_server, create_test_state};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::{Value, json};
    use sqlx::PgPool;

    fn form(content: &[u8]) -> MultipartForm {
        MultipartForm::new()
            .add_text("description", "Comprovante")
            .add_text("tags", "fiscal, 2024")
            .add_text("related_type", "orders")
            .add_text("related_id", "pedido-1")
            .add_part("file", Part::bytes(content.to_vec()).file_name("recibo.txt").mime_type("text/plain"))
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_list_download_delete(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let cookie = admin_cookie(&state.config, &admin);
        let server = create_test_server(state);

        let response = server
            .post("/admin/api/v1/files")
            .add_header("cookie", cookie.clone())
            .multipart(form(b"valor: 29,90"))
            .await;
        response.assert_status(StatusCode::CREATED);
        let file: Value = response.json();
        let id = file["id"].as_str().unwrap().to_string();
        assert_eq!(file["bucket"], "uploads");
        assert!(file["path"].as_str().unwrap().starts_with("orders/"));
        assert_eq!(file["metadata"]["tags"], json!(["fiscal", "2024"]));

        let page: Value = server
            .get("/admin/api/v1/files")
            .add_query_param("tag", "fiscal")
            .add_header("cookie", cookie.clone())
            .await
            .json();
        assert_eq!(page["total_count"], 1);

        let download = server
            .get(&format!("/admin/api/v1/files/{id}/download"))
            .add_header("cookie", cookie.clone())
            .await;
        download.assert_status_ok();
        assert_eq!(download.as_bytes().as_ref(), b"valor: 29,90");
        assert_eq!(download.header("content-type"), "text/plain");

        let updated: Value = server
            .patch(&format!("/admin/api/v1/files/{id}"))
            .add_header("cookie", cookie.clone())
            .json(&json!({"description": null, "tags": ["arquivado"]}))
            .await
            .json();
        assert!(updated["metadata"]["description"].is_null());
        assert_eq!(updated["metadata"]["related_id"], "pedido-1");

        server
            .delete(&format!("/admin/api/v1/files/{id}"))
            .add_header("cookie", cookie.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/admin/api/v1/files/{id}/download"))
            .add_header("cookie", cookie)
            .await
            .assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_without_file_is_rejected(pool: PgPool) {
        let state = create_test_state(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let server = create_test_server(state.clone());

        let response = server
            .post("/admin/api/v1/files")
            .add_header("cookie", admin_cookie(&state.config, &admin))
            .multipart(MultipartForm::new().add_text("description", "sem arquivo"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "No file provided");
    }
}

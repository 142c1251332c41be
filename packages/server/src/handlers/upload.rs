use axum::Json;
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use common::ShardLabel;
use common::storage::{BlobStore, BoxReader};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::auth::Principal;
use crate::error::{AppError, ErrorBody};
use crate::extractors::api_key::ApiKeyAuth;
use crate::extractors::multipart::UploadForm;
use crate::models::upload::{BulkUploadResponse, BulkUploadedFile, UploadResponse, UploadedFile};
use crate::records::NewFile;
use crate::state::AppState;
use crate::utils::mime::{AcceptedMime, generate_filename};

/// Multipart field carrying the file on the single route.
pub const SINGLE_FIELD: &str = "file";
/// Multipart field carrying each file on the bulk route.
pub const BULK_FIELD: &str = "files";

/// Headroom for multipart boundaries and part headers.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Request body ceiling for a route accepting up to `max_files` files.
pub fn upload_body_limit(max_file_size: u64, max_files: usize) -> DefaultBodyLimit {
    let limit = max_file_size
        .saturating_mul(max_files as u64)
        .saturating_add(MULTIPART_OVERHEAD);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}

#[utoipa::path(
    get,
    path = "/api/upload/",
    tag = "Uploads",
    operation_id = "health",
    summary = "Liveness check",
    responses((status = 200, description = "Service is up, body is `online`", body = String)),
)]
pub async fn health() -> &'static str {
    "online"
}

#[utoipa::path(
    post,
    path = "/api/upload/single",
    tag = "Uploads",
    operation_id = "uploadSingle",
    summary = "Upload one file",
    description = "Stores one JPEG, PNG or PDF (multipart field `file`, at most 50 MiB) in the \
        caller's shard and records its metadata. If the metadata cannot be saved the stored \
        file is removed again.",
    request_body(content_type = "multipart/form-data", description = "One `file` part"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file, too large or malformed body (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "API key missing (API_KEY_MISSING)", body = ErrorBody),
        (status = 403, description = "API key unknown (API_KEY_INVALID)", body = ErrorBody),
        (status = 415, description = "Content type not accepted (UNSUPPORTED_MEDIA_TYPE)", body = ErrorBody),
        (status = 429, description = "Upload quota exhausted (RATE_LIMITED)", body = ErrorBody),
        (status = 500, description = "Metadata could not be saved (PERSISTENCE_FAILURE)", body = ErrorBody),
    ),
    security(("api_key" = [])),
)]
#[instrument(skip_all, fields(owner_id = principal.owner_id))]
pub async fn upload_single(
    State(state): State<AppState>,
    ApiKeyAuth(principal): ApiKeyAuth,
    UploadForm(mut multipart): UploadForm,
) -> Result<Json<UploadResponse>, AppError> {
    let policy = FilePolicy {
        field: SINGLE_FIELD,
        max_files: 1,
        max_file_size: state.config.storage.max_file_size,
    };
    let staged = stage_files(&mut multipart, &policy)
        .await?
        .pop()
        .ok_or_else(|| AppError::Validation("No file uploaded".into()))?;

    let shard = state.shards.assign(&principal.api_key, principal.owner_id);
    let filename = write_blob(&*state.blob_store, &shard, &staged).await?;

    let new_file = staged.to_record(&principal, &shard, filename.clone());
    let created = match state.records.create_file(new_file).await {
        Ok(created) => created,
        Err(e) => {
            remove_blobs(&*state.blob_store, &shard, &[filename]).await;
            return Err(AppError::Persistence(e.to_string()));
        }
    };

    info!(file_id = created.id, %shard, size = created.size, "File uploaded");

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".into(),
        files: vec![UploadedFile::from(created)],
    }))
}

#[utoipa::path(
    post,
    path = "/api/upload/bulk",
    tag = "Uploads",
    operation_id = "uploadBulk",
    summary = "Upload up to five files",
    description = "Stores every `files` part in the caller's shard and records all metadata in \
        one transaction. If the transaction fails, every file written by this request is \
        removed again.",
    request_body(content_type = "multipart/form-data", description = "One to five `files` parts"),
    responses(
        (status = 200, description = "Files stored", body = BulkUploadResponse),
        (status = 400, description = "No files, too many files, too large or malformed body (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "API key missing (API_KEY_MISSING)", body = ErrorBody),
        (status = 403, description = "API key unknown (API_KEY_INVALID)", body = ErrorBody),
        (status = 415, description = "Content type not accepted (UNSUPPORTED_MEDIA_TYPE)", body = ErrorBody),
        (status = 429, description = "Hourly quota exhausted (RATE_LIMITED)", body = ErrorBody),
        (status = 500, description = "Metadata could not be saved (PERSISTENCE_FAILURE)", body = ErrorBody),
    ),
    security(("api_key" = [])),
)]
#[instrument(skip_all, fields(owner_id = principal.owner_id))]
pub async fn upload_bulk(
    State(state): State<AppState>,
    ApiKeyAuth(principal): ApiKeyAuth,
    UploadForm(mut multipart): UploadForm,
) -> Result<Json<BulkUploadResponse>, AppError> {
    let policy = FilePolicy {
        field: BULK_FIELD,
        max_files: state.config.storage.max_bulk_files,
        max_file_size: state.config.storage.max_file_size,
    };
    let staged = stage_files(&mut multipart, &policy).await?;
    if staged.is_empty() {
        return Err(AppError::Validation("No files uploaded".into()));
    }

    let shard = state.shards.assign(&principal.api_key, principal.owner_id);

    let mut written = Vec::with_capacity(staged.len());
    for file in &staged {
        match write_blob(&*state.blob_store, &shard, file).await {
            Ok(filename) => written.push(filename),
            Err(e) => {
                remove_blobs(&*state.blob_store, &shard, &written).await;
                return Err(e);
            }
        }
    }

    let records: Vec<NewFile> = staged
        .iter()
        .zip(&written)
        .map(|(file, filename)| file.to_record(&principal, &shard, filename.clone()))
        .collect();
    let files: Vec<BulkUploadedFile> = records.iter().map(BulkUploadedFile::from).collect();

    if let Err(e) = state.records.create_files(records).await {
        remove_blobs(&*state.blob_store, &shard, &written).await;
        return Err(AppError::Persistence(e.to_string()));
    }

    info!(count = files.len(), %shard, "Files uploaded");

    Ok(Json(BulkUploadResponse {
        message: "Files uploaded successfully".into(),
        files,
    }))
}

/// Public URL under which a stored blob is served.
pub fn public_url(shard: &ShardLabel, filename: &str) -> String {
    format!("/storage/{shard}/{filename}")
}

/// Which multipart field carries files, and how many and how large they may be.
struct FilePolicy {
    field: &'static str,
    max_files: usize,
    max_file_size: u64,
}

/// A validated upload parked in a temp file. The temp file is removed on drop.
struct StagedFile {
    temp: NamedTempFile,
    original_name: String,
    mime: AcceptedMime,
    size: u64,
}

impl StagedFile {
    fn to_record(&self, principal: &Principal, shard: &ShardLabel, file_name: String) -> NewFile {
        NewFile {
            original_name: self.original_name.clone(),
            url: public_url(shard, &file_name),
            file_name,
            size: i64::try_from(self.size).unwrap_or(i64::MAX),
            mime_type: self.mime.as_str().to_string(),
            app_key: principal.api_key.clone(),
            created_by_id: principal.owner_id,
        }
    }
}

/// Read every file part, validating count, type and size as it goes.
///
/// Nothing reaches the blob store from here: if any part is rejected the
/// already staged parts are dropped along with their temp files.
async fn stage_files(
    multipart: &mut Multipart,
    policy: &FilePolicy,
) -> Result<Vec<StagedFile>, AppError> {
    let mut staged = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        // Parts without a filename are plain form values.
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let field_name = field.name().unwrap_or_default().to_string();
        if field_name != policy.field {
            return Err(AppError::Validation(format!(
                "Unexpected field '{field_name}', expected '{}'",
                policy.field
            )));
        }

        if staged.len() >= policy.max_files {
            return Err(AppError::Validation(format!(
                "Too many files. At most {} allowed per request",
                policy.max_files
            )));
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let mime = AcceptedMime::from_content_type(&content_type)
            .ok_or(AppError::UnsupportedMediaType(content_type))?;

        let (temp, size) = stream_field_to_temp(field, policy.max_file_size).await?;
        staged.push(StagedFile {
            temp,
            original_name,
            mime,
            size,
        });
    }

    Ok(staged)
}

/// Stream a multipart field into a temp file, enforcing the size ceiling.
async fn stream_field_to_temp(
    mut field: Field<'_>,
    max_size: u64,
) -> Result<(NamedTempFile, u64), AppError> {
    let temp = tempfile::Builder::new()
        .prefix("upload-")
        .tempfile()
        .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;
    let handle = temp
        .reopen()
        .map_err(|e| AppError::Internal(format!("Failed to open temp file: {e}")))?;
    let mut temp_file = tokio::fs::File::from_std(handle);

    let mut total_size: u64 = 0;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?
    {
        total_size += chunk.len() as u64;
        if total_size > max_size {
            return Err(AppError::Validation(format!(
                "File exceeds maximum size of {max_size} bytes"
            )));
        }
        temp_file
            .write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
    }

    temp_file
        .flush()
        .await
        .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))?;

    Ok((temp, total_size))
}

/// Copy a staged file into the shard under a fresh name and return that name.
async fn write_blob(
    blob_store: &dyn BlobStore,
    shard: &ShardLabel,
    staged: &StagedFile,
) -> Result<String, AppError> {
    let filename = generate_filename(staged.mime);
    let file = tokio::fs::File::open(staged.temp.path())
        .await
        .map_err(|e| AppError::Internal(format!("Failed to reopen temp file: {e}")))?;
    let reader: BoxReader = Box::new(file);
    blob_store.put_stream(shard, &filename, reader).await?;
    Ok(filename)
}

/// Best-effort removal of blobs written by a failed request.
///
/// Returns how many blobs were actually deleted.
async fn remove_blobs(
    blob_store: &dyn BlobStore,
    shard: &ShardLabel,
    filenames: &[String],
) -> usize {
    let mut removed = 0usize;
    for filename in filenames {
        match blob_store.delete(shard, filename).await {
            Ok(true) => removed += 1,
            Ok(false) => warn!(%shard, %filename, "Orphaned blob was already gone"),
            Err(e) => warn!(%shard, %filename, error = %e, "Failed to delete orphaned blob"),
        }
    }
    info!(%shard, removed, total = filenames.len(), "Rolled back stored blobs");
    removed
}

use serde::Serialize;

use crate::entity::file;
use crate::records::NewFile;

/// One stored file in a single-upload response.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// File record ID.
    #[schema(example = 1)]
    pub id: i32,
    /// Generated storage filename.
    #[schema(example = "0190f0c4-5b2e-7c11-9a3d-3f1e2d4c5b6a.pdf")]
    pub filename: String,
    /// Filename as sent by the client.
    #[schema(example = "invoice.pdf")]
    pub original_name: String,
    /// Size in bytes.
    #[schema(example = 48213)]
    pub size: i64,
    #[schema(example = "application/pdf")]
    pub mimetype: String,
    /// Public URL of the stored file.
    #[schema(example = "/storage/000001knxgn3/0190f0c4-5b2e-7c11-9a3d-3f1e2d4c5b6a.pdf")]
    pub url: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    #[schema(example = "File uploaded successfully")]
    pub message: String,
    /// Always exactly one entry.
    pub files: Vec<UploadedFile>,
}

/// One stored file in a bulk-upload response. Record IDs are not included.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadedFile {
    pub filename: String,
    pub original_name: String,
    pub size: i64,
    pub mimetype: String,
    pub url: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct BulkUploadResponse {
    #[schema(example = "Files uploaded successfully")]
    pub message: String,
    pub files: Vec<BulkUploadedFile>,
}

impl From<file::Model> for UploadedFile {
    fn from(model: file::Model) -> Self {
        Self {
            id: model.id,
            filename: model.file_name,
            original_name: model.original_name,
            size: model.size,
            mimetype: model.mime_type,
            url: model.url,
        }
    }
}

impl From<&NewFile> for BulkUploadedFile {
    fn from(file: &NewFile) -> Self {
        Self {
            filename: file.file_name.clone(),
            original_name: file.original_name.clone(),
            size: file.size,
            mimetype: file.mime_type.clone(),
            url: file.url.clone(),
        }
    }
}

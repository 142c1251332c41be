use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::error::StorageError;
use super::traits::{BlobStore, BoxReader};
use crate::shard::ShardLabel;

/// Filesystem-backed shard store.
///
/// Blobs live at `{base_path}/{shard}/{filename}`. Writes are staged in
/// `{base_path}/.tmp` and renamed into place, so a reader never observes a
/// partially written blob.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Compute the filesystem path for a blob.
    pub fn blob_path(&self, shard: &ShardLabel, filename: &str) -> Result<PathBuf, StorageError> {
        validate_blob_name(filename)?;
        Ok(self.base_path.join(shard.as_str()).join(filename))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

fn validate_blob_name(filename: &str) -> Result<(), StorageError> {
    let invalid = filename.is_empty()
        || filename.starts_with('.')
        || filename.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StorageError::InvalidName(filename.to_string()));
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_stream(
        &self,
        shard: &ShardLabel,
        filename: &str,
        mut reader: BoxReader,
    ) -> Result<u64, StorageError> {
        let blob_path = self.blob_path(shard, filename)?;
        let temp_path = self.temp_path();
        let mut total_bytes: u64 = 0;

        let mut buf = vec![0u8; 64 * 1024]; // 64KB read buffer
        let mut temp_file = fs::File::create(&temp_path).await?;

        let copied = async {
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }

                total_bytes += n as u64;
                if total_bytes > self.max_size {
                    return Err(StorageError::SizeLimitExceeded {
                        actual: total_bytes,
                        limit: self.max_size,
                    });
                }

                temp_file.write_all(&buf[..n]).await?;
            }
            temp_file.flush().await?;
            Ok::<(), StorageError>(())
        }
        .await;
        drop(temp_file);

        if let Err(e) = copied {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &blob_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(%shard, filename, bytes = total_bytes, "Blob written");
        Ok(total_bytes)
    }

    async fn exists(&self, shard: &ShardLabel, filename: &str) -> Result<bool, StorageError> {
        let blob_path = self.blob_path(shard, filename)?;
        Ok(fs::try_exists(&blob_path).await?)
    }

    async fn delete(&self, shard: &ShardLabel, filename: &str) -> Result<bool, StorageError> {
        let blob_path = self.blob_path(shard, filename)?;
        match fs::remove_file(&blob_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(&self, shard: &ShardLabel, filename: &str) -> Result<u64, StorageError> {
        let blob_path = self.blob_path(shard, filename)?;
        match fs::metadata(&blob_path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(blob_path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

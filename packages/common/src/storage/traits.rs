use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::error::StorageError;
use crate::shard::ShardLabel;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Shard-scoped blob storage.
///
/// Blobs are addressed by `(shard, filename)`; the store owns the mapping to
/// physical locations and creates shard namespaces on demand.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `shard/filename` and return the number of bytes written.
    async fn put(
        &self,
        shard: &ShardLabel,
        filename: &str,
        data: &[u8],
    ) -> Result<u64, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(shard, filename, reader).await
    }

    /// Store data from an async reader and return the number of bytes written.
    ///
    /// The blob becomes visible only once fully written.
    async fn put_stream(
        &self,
        shard: &ShardLabel,
        filename: &str,
        reader: BoxReader,
    ) -> Result<u64, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, shard: &ShardLabel, filename: &str) -> Result<bool, StorageError>;

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, shard: &ShardLabel, filename: &str) -> Result<bool, StorageError>;

    /// Get the size of a blob in bytes.
    async fn size(&self, shard: &ShardLabel, filename: &str) -> Result<u64, StorageError>;
}

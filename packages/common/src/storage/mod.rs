mod error;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use filesystem::FilesystemBlobStore;
pub use traits::{BlobStore, BoxReader};

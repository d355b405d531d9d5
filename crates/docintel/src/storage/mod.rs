//! Object storage: where uploaded documents are fetched from.

pub mod filesystem;
pub mod http;

use async_trait::async_trait;

use crate::error::StorageError;

pub use filesystem::FileStore;
pub use http::HttpStore;

/// Read access to stored documents by opaque key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

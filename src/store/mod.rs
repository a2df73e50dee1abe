pub mod client;
pub mod error;
pub mod http;
pub mod memory;
pub mod types;

use async_trait::async_trait;
use bytes::Bytes;

pub use client::ArtifactClient;
pub use error::StoreError;
pub use http::HttpArtifactStore;
pub use memory::InMemoryArtifactStore;
pub use types::{Artifact, Location, MediaFormat};

/// Blob storage addressed by bucket and key on write, by location on read.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `body` under `bucket/key`. Either the whole object is written and
    /// its location returned, or nothing is visible to readers.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<Location, StoreError>;

    async fn get(&self, location: &Location) -> Result<Bytes, StoreError>;
}

use std::sync::Arc;

use tracing::{debug, info};

use super::error::StoreError;
use super::types::{Artifact, Location};
use super::ArtifactStore;

/// Uploads caller artifacts into the input bucket under fresh keys.
#[derive(Clone)]
pub struct ArtifactClient {
    store: Arc<dyn ArtifactStore>,
    bucket: String,
}

impl ArtifactClient {
    pub fn new(store: Arc<dyn ArtifactStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Stores the artifact under a new unique key and returns where it landed.
    ///
    /// Not retried here: a failed upload surfaces as-is and the caller decides.
    pub async fn upload(&self, artifact: &Artifact) -> Result<Location, StoreError> {
        let key = artifact.unique_key();
        debug!(bucket = %self.bucket, key = %key, bytes = artifact.len(), "uploading artifact");

        let location = self
            .store
            .put(
                &self.bucket,
                &key,
                artifact.bytes.clone(),
                &artifact.format.content_type(),
            )
            .await?;

        info!(location = %location, "artifact uploaded");
        Ok(location)
    }
}

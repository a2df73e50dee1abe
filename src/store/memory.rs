use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use super::error::StoreError;
use super::types::Location;
use super::ArtifactStore;

/// Thread-safe store kept in process memory, keyed by rendered location.
///
/// Backs the `demo` command and the test suite. Failures can be injected to
/// exercise the orchestrator's error paths.
pub struct InMemoryArtifactStore {
    scheme: String,
    objects: Mutex<HashMap<String, Bytes>>,
    deny_puts: AtomicBool,
    failing_gets: AtomicU32,
    puts: AtomicU32,
    gets: AtomicU32,
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new("mem")
    }
}

impl InMemoryArtifactStore {
    pub fn new(scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            objects: Mutex::new(HashMap::new()),
            deny_puts: AtomicBool::new(false),
            failing_gets: AtomicU32::new(0),
            puts: AtomicU32::new(0),
            gets: AtomicU32::new(0),
        }
    }

    /// Every subsequent `put` fails with [`StoreError::PermissionDenied`].
    pub fn deny_puts(&self) {
        self.deny_puts.store(true, Ordering::SeqCst);
    }

    /// The next `count` calls to `get` fail with a transient error.
    pub fn fail_next_gets(&self, count: u32) {
        self.failing_gets.store(count, Ordering::SeqCst);
    }

    pub fn insert(&self, location: &Location, body: impl Into<Bytes>) {
        self.lock().insert(location.as_str().to_string(), body.into());
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.lock().contains_key(location.as_str())
    }

    pub fn object_count(&self) -> usize {
        self.lock().len()
    }

    pub fn put_count(&self) -> u32 {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> u32 {
        self.gets.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Bytes>> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> Result<Location, StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let location = Location::object(&self.scheme, bucket, key);
        if self.deny_puts.load(Ordering::SeqCst) {
            return Err(StoreError::PermissionDenied {
                location: location.to_string(),
                message: "writes disabled".into(),
            });
        }
        self.insert(&location, body);
        Ok(location)
    }

    async fn get(&self, location: &Location) -> Result<Bytes, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failing_gets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable {
                status: 503,
                message: "injected failure".into(),
            });
        }
        self.lock()
            .get(location.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(location.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryArtifactStore::new("s3");
        let loc = store
            .put("in", "a.mp3", Bytes::from_static(b"abc"), "audio/mp3")
            .await
            .unwrap();
        assert_eq!(loc.as_str(), "s3://in/a.mp3");
        assert_eq!(store.get(&loc).await.unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(store.put_count(), 1);
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = InMemoryArtifactStore::default();
        let err = store
            .get(&Location::from_raw("mem://out/none.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn injected_get_failures_run_out() {
        let store = InMemoryArtifactStore::default();
        let loc = Location::from_raw("mem://out/x.json");
        store.insert(&loc, "x");
        store.fail_next_gets(2);

        assert!(store.get(&loc).await.unwrap_err().is_transient());
        assert!(store.get(&loc).await.unwrap_err().is_transient());
        assert!(store.get(&loc).await.is_ok());
    }

    #[tokio::test]
    async fn denied_puts_store_nothing() {
        let store = InMemoryArtifactStore::default();
        store.deny_puts();
        let err = store
            .put("in", "a.mp3", Bytes::from_static(b"abc"), "audio/mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { .. }));
        assert_eq!(store.object_count(), 0);
    }
}

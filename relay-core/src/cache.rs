// Keyed hand-off cache on top of a shared store.
//
// The relay `put`s a finished transcription and hands the key to the
// requester, which `take_once`s it. Every entry expires, so results whose
// requester went away are swept instead of piling up.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

use crate::error::RelayError;
use crate::protocol::TranscriptPayload;
use crate::store::{SharedStore, StoredEntry};

pub const KEY_PREFIX: &str = "transcription_";

/// Unique key source scoped to one relay instance.
///
/// A random instance nonce keeps keys distinct from entries left behind by
/// an earlier process sharing the same persistent store.
#[derive(Debug)]
pub struct KeyGenerator {
    instance: u32,
    next: AtomicU64,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self {
            instance: rand::random(),
            next: AtomicU64::new(0),
        }
    }

    pub fn next_key(&self) -> String {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{:08x}_{}", KEY_PREFIX, self.instance, seq)
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or(0)
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn SharedStore>,
    keys: Arc<KeyGenerator>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(store: Arc<dyn SharedStore>, ttl: Duration) -> Self {
        Self {
            store,
            keys: Arc::new(KeyGenerator::new()),
            ttl,
        }
    }

    /// Store a result under a fresh key. The entry is durable in the store
    /// before the key is returned.
    pub async fn put(&self, value: TranscriptPayload) -> Result<String, RelayError> {
        let key = self.keys.next_key();
        let entry = StoredEntry {
            value,
            expires_at_ms: now_ms().saturating_add(millis(self.ttl)),
        };

        self.store.set(&key, &entry).await.map_err(|e| {
            tracing::error!(storage_key = %key, error = ?e, "Result write failed");
            RelayError::StorageWrite(e.to_string())
        })?;

        tracing::debug!(storage_key = %key, "Result stored");
        Ok(key)
    }

    /// Read a result and drop it from the store.
    ///
    /// Absent, empty or expired entries are `MissingStoredResult`. Removal
    /// after a successful read is best-effort: the value is returned even if
    /// the delete fails.
    pub async fn take_once(&self, key: &str) -> Result<TranscriptPayload, RelayError> {
        let entry = self.store.get(key).await.map_err(|e| {
            tracing::error!(storage_key = %key, error = ?e, "Result read failed");
            RelayError::StorageRead(e.to_string())
        })?;

        let entry = match entry {
            Some(entry) => entry,
            None => return Err(RelayError::MissingStoredResult(key.to_string())),
        };

        if let Err(e) = self.store.remove(key).await {
            tracing::warn!(storage_key = %key, error = ?e, "Failed to clean up stored result");
        }

        if entry.is_expired(now_ms()) {
            tracing::warn!(storage_key = %key, "Stored result expired before pickup");
            return Err(RelayError::MissingStoredResult(key.to_string()));
        }
        if entry.value.text.is_empty() {
            return Err(RelayError::MissingStoredResult(key.to_string()));
        }

        Ok(entry.value)
    }

    /// Drop an entry nobody will pick up. Best-effort.
    pub async fn discard(&self, key: &str) {
        match self.store.remove(key).await {
            Ok(()) => tracing::debug!(storage_key = %key, "Discarded undeliverable result"),
            Err(e) => tracing::warn!(
                storage_key = %key,
                error = ?e,
                "Discard failed, leaving for eviction"
            ),
        }
    }

    /// Delete every expired transcription entry. Returns how many went.
    pub async fn evict_expired(&self) -> Result<usize, RelayError> {
        let keys = self
            .store
            .keys()
            .await
            .map_err(|e| RelayError::StorageRead(e.to_string()))?;

        let now = now_ms();
        let mut evicted = 0;

        for key in keys.iter().filter(|k| k.starts_with(KEY_PREFIX)) {
            match self.store.get(key).await {
                Ok(Some(entry)) if entry.is_expired(now) => {
                    if let Err(e) = self.store.remove(key).await {
                        tracing::warn!(storage_key = %key, error = ?e, "Eviction failed");
                        continue;
                    }
                    evicted += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    // Unreadable entries would otherwise live forever.
                    tracing::warn!(storage_key = %key, error = ?e, "Dropping unreadable entry");
                    if self.store.remove(key).await.is_ok() {
                        evicted += 1;
                    }
                }
            }
        }

        if evicted > 0 {
            tracing::info!("Evicted {} expired result(s)", evicted);
        }
        Ok(evicted)
    }

    /// Run `evict_expired` every `every` until the task is aborted.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(e) = cache.evict_expired().await {
                    tracing::warn!("Result sweep failed: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{FileStore, MemoryStore};
    use async_trait::async_trait;
    use std::collections::HashSet;

    fn payload(text: &str) -> TranscriptPayload {
        TranscriptPayload {
            text: text.to_string(),
            audio_base64: None,
        }
    }

    fn memory_cache(ttl: Duration) -> (Arc<MemoryStore>, ResultCache) {
        let store = Arc::new(MemoryStore::new());
        let cache = ResultCache::new(store.clone(), ttl);
        (store, cache)
    }

    #[test]
    fn test_keys_are_unique_and_prefixed() {
        let keys = KeyGenerator::new();
        let generated: HashSet<String> = (0..1000).map(|_| keys.next_key()).collect();

        assert_eq!(generated.len(), 1000);
        assert!(generated.iter().all(|k| k.starts_with(KEY_PREFIX)));
    }

    #[tokio::test]
    async fn test_put_then_take_once_removes_entry() {
        let (store, cache) = memory_cache(Duration::from_secs(60));

        let key = cache.put(payload("hello world")).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_some());

        let value = cache.take_once(&key).await.unwrap();
        assert_eq!(value.text, "hello world");
        assert!(store.get(&key).await.unwrap().is_none());

        let again = cache.take_once(&key).await.unwrap_err();
        assert!(matches!(again, RelayError::MissingStoredResult(_)));
    }

    #[tokio::test]
    async fn test_empty_value_is_missing() {
        let (_, cache) = memory_cache(Duration::from_secs(60));
        let key = cache.put(payload("")).await.unwrap();

        let err = cache.take_once(&key).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingStoredResult(_)));
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept() {
        let (store, cache) = memory_cache(Duration::ZERO);

        let key = cache.put(payload("orphan")).await.unwrap();
        let evicted = cache.evict_expired().await.unwrap();

        assert_eq!(evicted, 1);
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_delivered() {
        let (store, cache) = memory_cache(Duration::ZERO);
        let key = cache.put(payload("late")).await.unwrap();

        let err = cache.take_once(&key).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingStoredResult(_)));
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_and_foreign_entries() {
        let (store, cache) = memory_cache(Duration::from_secs(60));
        let key = cache.put(payload("fresh")).await.unwrap();
        store
            .set(
                "settings",
                &StoredEntry {
                    value: payload("not ours"),
                    expires_at_ms: 0,
                },
            )
            .await
            .unwrap();

        assert_eq!(cache.evict_expired().await.unwrap(), 0);
        assert!(store.get(&key).await.unwrap().is_some());
        assert!(store.get("settings").await.unwrap().is_some());
    }

    /// Store whose deletes always fail.
    struct StickyStore(MemoryStore);

    #[async_trait]
    impl SharedStore for StickyStore {
        async fn set(&self, key: &str, entry: &StoredEntry) -> Result<(), StoreError> {
            self.0.set(key, entry).await
        }
        async fn get(&self, key: &str) -> Result<Option<StoredEntry>, StoreError> {
            self.0.get(key).await
        }
        async fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
        async fn keys(&self) -> Result<Vec<String>, StoreError> {
            self.0.keys().await
        }
    }

    #[tokio::test]
    async fn test_cleanup_failure_still_delivers() {
        let cache = ResultCache::new(
            Arc::new(StickyStore(MemoryStore::new())),
            Duration::from_secs(60),
        );
        let key = cache.put(payload("delivered")).await.unwrap();

        let value = cache.take_once(&key).await.unwrap();
        assert_eq!(value.text, "delivered");
    }

    /// Store whose reads always fail.
    struct UnreadableStore;

    #[async_trait]
    impl SharedStore for UnreadableStore {
        async fn set(&self, _key: &str, _entry: &StoredEntry) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get(&self, _key: &str) -> Result<Option<StoredEntry>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }
        async fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn keys(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_read_failure_is_storage_read_error() {
        let cache = ResultCache::new(Arc::new(UnreadableStore), Duration::from_secs(60));
        let key = cache.put(payload("unreachable")).await.unwrap();

        let err = cache.take_once(&key).await.unwrap_err();
        assert!(matches!(err, RelayError::StorageRead(ref m) if m.contains("disk gone")));
    }

    #[tokio::test]
    async fn test_sweep_drops_corrupt_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let cache = ResultCache::new(store.clone(), Duration::from_secs(60));

        let live = cache.put(payload("fine")).await.unwrap();
        let corrupt = dir.path().join("transcription_corrupt.json");
        std::fs::write(&corrupt, b"{not json").unwrap();

        assert_eq!(cache.evict_expired().await.unwrap(), 1);
        assert!(!corrupt.exists());
        assert!(store.get(&live).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_on_schedule() {
        let (store, cache) = memory_cache(Duration::ZERO);
        let sweeper = cache.spawn_sweeper(Duration::from_secs(60));

        // Let the immediate first tick pass before anything is stored.
        tokio::time::sleep(Duration::from_millis(1)).await;
        let key = cache.put(payload("orphan")).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(store.get(&key).await.unwrap().is_none());

        sweeper.abort();
    }

    #[tokio::test]
    async fn test_huge_ttl_saturates_instead_of_wrapping() {
        // 2^61 s is 125 * 2^64 ms, which a plain `as u64` turns into 0.
        let (_, cache) = memory_cache(Duration::from_secs(1 << 61));
        let key = cache.put(payload("kept")).await.unwrap();

        assert_eq!(cache.take_once(&key).await.unwrap().text, "kept");
    }
}

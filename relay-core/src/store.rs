// Shared key/value store reachable from both the relay and its requesters.
// Only used as a hand-off buffer for finished transcriptions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::protocol::TranscriptPayload;

/// One pending result awaiting pickup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry {
    pub value: TranscriptPayload,
    /// Epoch milliseconds after which the entry is garbage.
    pub expires_at_ms: u64,
}

impl StoredEntry {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn set(&self, key: &str, entry: &StoredEntry) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// In-process store; lives as long as the relay process.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn set(&self, key: &str, entry: &StoredEntry) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

const TMP_SUFFIX: &str = ".json.tmp";

/// Directory-backed store, one JSON document per key. Survives restarts,
/// which is what makes expiry necessary.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        // A crash between write and rename leaves a temp file behind.
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.to_str().map_or(false, |p| p.ends_with(TMP_SUFFIX)) {
                tracing::warn!("Removing partial write {}", path.display());
                tokio::fs::remove_file(&path).await?;
            }
        }

        tracing::debug!("File store opened at {}", dir.display());
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl SharedStore for FileStore {
    async fn set(&self, key: &str, entry: &StoredEntry) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        let data = serde_json::to_vec(entry)?;

        // Write then rename so a reader never sees a half-written entry.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredEntry>, StoreError> {
        let path = self.entry_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |e| e == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        Ok(keys)
    }
}

//! Device-style key/value persistence used for daily slot status and the
//! completion outbox. Values are JSON documents.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<serde_json::Value>>;
    async fn put(&self, key: &str, value: serde_json::Value) -> StoreResult<()>;
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Read and deserialize a value. A value that no longer parses is moved aside to
/// `<key>.unreadable.<id>` and the key then reads as absent.
pub async fn load<T: DeserializeOwned>(
    store: &dyn LocalStore,
    key: &str,
) -> StoreResult<Option<T>> {
    let Some(value) = store.get(key).await? else {
        return Ok(None);
    };

    match T::deserialize(&value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            let aside = quarantine_key(key);
            store.put(&aside, value).await?;
            store.remove(key).await?;
            error!("Unreadable value under {} moved to {}: {}", key, aside, e);
            Ok(None)
        }
    }
}

fn quarantine_key(key: &str) -> String {
    format!("{}.unreadable.{}", key, Uuid::new_v4().simple())
}

pub async fn save<T: Serialize + Sync>(
    store: &dyn LocalStore,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    store.put(key, serde_json::to_value(value)?).await
}

/// One JSON file per key, replaced atomically via rename
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub async fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> StoreResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(&value)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> StoreResult<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("kv")).await.unwrap();

        assert!(store.get("daily_ad_status:u1").await.unwrap().is_none());
        store.put("daily_ad_status:u1", json!({"date": "2026-10-19"})).await.unwrap();
        assert_eq!(
            store.get("daily_ad_status:u1").await.unwrap(),
            Some(json!({"date": "2026-10-19"}))
        );

        store.remove("daily_ad_status:u1").await.unwrap();
        store.remove("daily_ad_status:u1").await.unwrap();
        assert!(store.get("daily_ad_status:u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            save(&store, "outbox", &vec![1, 2, 3]).await.unwrap();
        }
        let store = FileStore::open(dir.path()).await.unwrap();
        let value: Option<Vec<i32>> = load(&store, "outbox").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_unreadable_value_is_moved_aside() {
        let store = MemoryStore::new();
        store.put("k", json!("not a list")).await.unwrap();

        let value: Option<Vec<i32>> = load(&store, "k").await.unwrap();
        assert!(value.is_none());

        let keys = store.keys().await;
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("k.unreadable."));
        assert_eq!(store.get(&keys[0]).await.unwrap(), Some(json!("not a list")));

        // The original key is free for new writes
        save(&store, "k", &vec![7]).await.unwrap();
        let value: Option<Vec<i32>> = load(&store, "k").await.unwrap();
        assert_eq!(value, Some(vec![7]));
        assert_eq!(store.keys().await.len(), 2);
    }
}

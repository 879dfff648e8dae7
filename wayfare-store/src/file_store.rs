use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::kv::KeyValueStore;
use crate::{StoreError, StoreResult};

type Namespace = HashMap<String, String>;

/// Durable local backend: one `{namespace}.json` file per namespace under
/// `data_dir`, holding a map of key to serialized value.
pub struct FileStore {
    data_dir: PathBuf,
    // Serializes read-modify-write cycles on the namespace files
    write_lock: Mutex<()>,
}

impl FileStore {
    pub async fn open(data_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).await.map_err(|e| io_error(&data_dir, e))?;
        info!(path = %data_dir.display(), "Using file storage backend");
        Ok(Self { data_dir, write_lock: Mutex::new(()) })
    }

    fn path(&self, namespace: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", namespace))
    }

    async fn read(&self, namespace: &str) -> StoreResult<Namespace> {
        let path = self.path(namespace);
        match fs::read_to_string(&path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Namespace::new()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    // Write to a sibling file, then rename over the old one
    async fn write(&self, namespace: &str, entries: &Namespace) -> StoreResult<()> {
        let path = self.path(namespace);
        if entries.is_empty() {
            return self.delete(namespace).await;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &path).await.map_err(|e| io_error(&path, e))?;
        debug!(namespace, keys = entries.len(), "Wrote namespace file");
        Ok(())
    }

    async fn delete(&self, namespace: &str) -> StoreResult<()> {
        let path = self.path(namespace);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

fn io_error(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Backend(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read(namespace).await?.remove(key))
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read(namespace).await?;
        entries.insert(key.to_string(), value.to_string());
        self.write(namespace, &entries).await
    }

    async fn remove(&self, namespace: &str, key: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read(namespace).await?;
        if entries.remove(key).is_some() {
            self.write(namespace, &entries).await?;
        }
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.delete(namespace).await
    }
}

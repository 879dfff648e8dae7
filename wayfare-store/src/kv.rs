use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::StoreResult;

/// Namespaced key-value persistence. Each namespace holds one serialized
/// JSON blob per logical key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, namespace: &str, key: &str, value: &str) -> StoreResult<()>;

    async fn remove(&self, namespace: &str, key: &str) -> StoreResult<()>;

    /// Drop every key in a namespace
    async fn clear(&self, namespace: &str) -> StoreResult<()>;
}

pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    namespace: &str,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(namespace, key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    namespace: &str,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(namespace, key, &raw).await
}

/// Process-local backend, used in tests and when no durable backend is
/// configured.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        entries
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        if let Some(ns) = entries.get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> StoreResult<()> {
        self.entries.write().await.remove(namespace);
        Ok(())
    }
}

pub mod app_config;
pub mod auth_store;
pub mod booking_cache;
pub mod file_store;
pub mod kv;
pub mod redis_repo;
pub mod search_prefs;

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub use app_config::Config;
pub use auth_store::{AuthStore, PersistedAuth};
pub use booking_cache::BookingCache;
pub use file_store::FileStore;
pub use kv::{KeyValueStore, MemoryStore};
pub use redis_repo::RedisStore;
pub use search_prefs::{RecentSearch, SearchPreferences, SearchPrefsStore};

use app_config::{SearchConfig, StorageBackend, StorageConfig};

pub const AUTH_NAMESPACE: &str = "auth-store";
pub const BOOKING_NAMESPACE: &str = "booking-store";
pub const SEARCH_NAMESPACE: &str = "flight-search-store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The three persisted stores, sharing one backend.
#[derive(Clone)]
pub struct LocalStores {
    pub auth: AuthStore,
    pub bookings: BookingCache,
    pub search: SearchPrefsStore,
}

impl LocalStores {
    pub fn new(backend: Arc<dyn KeyValueStore>, recent_limit: usize) -> Self {
        Self {
            auth: AuthStore::new(backend.clone()),
            bookings: BookingCache::new(backend.clone()),
            search: SearchPrefsStore::new(backend, recent_limit),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), SearchConfig::default().recent_limit)
    }

    pub async fn from_config(config: &Config) -> StoreResult<Self> {
        let backend = open_backend(&config.storage).await?;
        Ok(Self::new(backend, config.search.recent_limit))
    }

    /// Wipes every namespace. Used on sign-out.
    pub async fn clear_all(&self) -> StoreResult<()> {
        self.auth.clear().await?;
        self.bookings.clear().await?;
        self.search.clear().await?;
        info!("Cleared local stores");
        Ok(())
    }
}

pub async fn open_backend(storage: &StorageConfig) -> StoreResult<Arc<dyn KeyValueStore>> {
    match storage.backend {
        StorageBackend::File => Ok(Arc::new(FileStore::open(&storage.data_dir).await?)),
        StorageBackend::Memory => {
            warn!("Using in-memory storage backend, nothing survives a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Redis => {
            let url = storage
                .redis_url
                .as_deref()
                .ok_or_else(|| StoreError::Config("storage.redis_url is required for the redis backend".into()))?;
            let store = RedisStore::new(url).await?;
            info!("Using Redis storage backend");
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfare_shared::Masked;

    #[tokio::test]
    async fn test_clear_all_wipes_every_namespace() {
        let stores = LocalStores::in_memory();
        stores
            .auth
            .save(&PersistedAuth {
                user: None,
                access_token: Masked::<String>::from("a"),
                refresh_token: Masked::<String>::from("r"),
            })
            .await
            .unwrap();
        stores.search.set_from("JFK").await.unwrap();

        stores.clear_all().await.unwrap();

        assert!(stores.auth.load().await.unwrap().is_none());
        assert!(stores.bookings.list().await.unwrap().is_empty());
        assert_eq!(stores.search.load().await.unwrap(), SearchPreferences::default());
    }

    #[tokio::test]
    async fn test_redis_backend_requires_url() {
        let storage = StorageConfig { backend: StorageBackend::Redis, ..Default::default() };
        assert!(matches!(open_backend(&storage).await, Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_default_backend_persists_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig { data_dir: dir.path().join("data"), ..Default::default() };
        assert_eq!(storage.backend, StorageBackend::File);

        let stores = LocalStores::new(open_backend(&storage).await.unwrap(), 5);
        stores.search.set_from("JFK").await.unwrap();
        drop(stores);

        let restarted = LocalStores::new(open_backend(&storage).await.unwrap(), 5);
        assert_eq!(restarted.search.load().await.unwrap().from, "JFK");
    }
}

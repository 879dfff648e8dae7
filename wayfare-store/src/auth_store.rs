use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wayfare_shared::{AppUser, Masked};

use crate::kv::{load_json, save_json, KeyValueStore};
use crate::{StoreResult, AUTH_NAMESPACE};

const SESSION_KEY: &str = "session";

/// Session blob kept across restarts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAuth {
    #[serde(default)]
    pub user: Option<AppUser>,
    pub access_token: Masked<String>,
    pub refresh_token: Masked<String>,
}

#[derive(Clone)]
pub struct AuthStore {
    backend: Arc<dyn KeyValueStore>,
}

impl AuthStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub async fn load(&self) -> StoreResult<Option<PersistedAuth>> {
        load_json(self.backend.as_ref(), AUTH_NAMESPACE, SESSION_KEY).await
    }

    pub async fn save(&self, auth: &PersistedAuth) -> StoreResult<()> {
        save_json(self.backend.as_ref(), AUTH_NAMESPACE, SESSION_KEY, auth).await
    }

    pub async fn clear(&self) -> StoreResult<()> {
        self.backend.clear(AUTH_NAMESPACE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    #[tokio::test]
    async fn test_save_load_clear() {
        let store = AuthStore::new(Arc::new(MemoryStore::new()));
        assert!(store.load().await.unwrap().is_none());

        let auth = PersistedAuth {
            user: Some(AppUser {
                id: "u1".to_string(),
                email: "ada@example.com".to_string(),
                ..Default::default()
            }),
            access_token: Masked::<String>::from("access"),
            refresh_token: Masked::<String>::from("refresh"),
        };
        store.save(&auth).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(auth));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[test]
    fn test_tokens_are_persisted_but_not_logged() {
        let auth = PersistedAuth {
            user: None,
            access_token: Masked::<String>::from("secret-access"),
            refresh_token: Masked::<String>::from("secret-refresh"),
        };
        let json = serde_json::to_value(&auth).unwrap();
        assert_eq!(json["accessToken"], "secret-access");
        assert!(!format!("{:?}", auth).contains("secret"));
    }
}

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::info;

use crate::kv::KeyValueStore;
use crate::StoreResult;

const SCAN_BATCH: usize = 100;

/// Durable backend: keys are laid out as `{namespace}:{key}`.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    fn key(namespace: &str, key: &str) -> String {
        format!("{}:{}", namespace, key)
    }

    /// Glob matching every key in `namespace`, with glob metacharacters escaped
    fn namespace_pattern(namespace: &str) -> String {
        let mut pattern = String::with_capacity(namespace.len() + 2);
        for c in namespace.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push_str(":*");
        pattern
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(Self::key(namespace, key)).await?;
        Ok(value)
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set::<_, _, ()>(Self::key(namespace, key), value).await?;
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(Self::key(namespace, key)).await?;
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let pattern = Self::namespace_pattern(namespace);
        let mut cursor: u64 = 0;
        let mut cleared = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                conn.del::<_, ()>(&keys).await?;
                cleared += keys.len();
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        info!("Cleared {} keys from namespace {}", cleared, namespace);
        Ok(())
    }
}

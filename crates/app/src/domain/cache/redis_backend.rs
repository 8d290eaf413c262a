//! Redis cart cache.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    future::Future,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisError, aio::MultiplexedConnection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    deadline::bounded,
    domain::{
        cache::{CacheEntry, CacheError, CartCache},
        carts::models::Owner,
    },
};

/// Cart cache stored in Redis as JSON under `<prefix>:cart:<kind>:<id>`.
///
/// The connection is opened on first use and dropped after any failure, so the next call
/// reconnects once Redis is back.
#[derive(Clone)]
pub struct RedisCartCache {
    client: Client,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
    prefix: String,
    timeout: Duration,
}

impl Debug for RedisCartCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RedisCartCache")
            .field("prefix", &self.prefix)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RedisCartCache {
    /// Create a cache for `url` without connecting.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not a valid Redis URL.
    pub fn new(
        url: &str,
        prefix: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            client: Client::open(url)?,
            connection: Arc::new(Mutex::new(None)),
            prefix: prefix.into(),
            timeout,
        })
    }

    pub fn key(&self, owner: &Owner) -> String {
        cache_key(&self.prefix, owner)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.connection.lock().await;

        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }

        let connection = self.client.get_multiplexed_async_connection().await?;

        debug!(prefix = %self.prefix, "connected to cart cache");

        *slot = Some(connection.clone());

        Ok(connection)
    }

    /// Run one command within the timeout, dropping the connection if it fails.
    async fn call<T, F, Fut>(&self, command: F) -> Result<T, CacheError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut + Send,
        Fut: Future<Output = Result<T, RedisError>> + Send,
        T: Send,
    {
        let result = bounded(self.timeout, CacheError::Timeout, async {
            let connection = self.connection().await?;

            Ok::<_, CacheError>(command(connection).await?)
        })
        .await;

        if matches!(result, Err(CacheError::Unavailable(_) | CacheError::Timeout)) {
            self.connection.lock().await.take();
        }

        result
    }
}

fn cache_key(prefix: &str, owner: &Owner) -> String {
    format!("{prefix}:cart:{}:{}", owner.kind.as_str(), owner.id)
}

#[async_trait]
impl CartCache for RedisCartCache {
    async fn get(&self, owner: &Owner) -> Result<Option<CacheEntry>, CacheError> {
        let key = self.key(owner);

        let payload = self
            .call(|mut connection| async move { connection.get::<_, Option<String>>(key).await })
            .await?;

        Ok(payload
            .map(|payload| serde_json::from_str(&payload))
            .transpose()?)
    }

    async fn set(&self, owner: &Owner, entry: &CacheEntry) -> Result<(), CacheError> {
        let key = self.key(owner);
        let payload = serde_json::to_string(entry)?;
        let seconds = entry.ttl_seconds.max(1);

        self.call(|mut connection| async move {
            connection.set_ex::<_, _, ()>(key, payload, seconds).await
        })
        .await
    }

    async fn invalidate(&self, owner: &Owner) -> Result<(), CacheError> {
        let key = self.key(owner);

        self.call(|mut connection| async move {
            connection.del::<_, u64>(key).await.map(drop)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    /// Nothing listens on port 1.
    const UNREACHABLE: &str = "redis://127.0.0.1:1";

    #[test]
    fn creating_the_cache_does_not_connect() {
        let cache = RedisCartCache::new(UNREACHABLE, "trolley", Duration::from_millis(250));

        assert!(cache.is_ok(), "expected a lazy cache, got {cache:?}");
    }

    #[test]
    fn malformed_urls_are_rejected() {
        let cache = RedisCartCache::new("not a url", "trolley", Duration::from_millis(250));

        assert!(
            matches!(cache, Err(CacheError::Unavailable(_))),
            "expected Unavailable, got {cache:?}"
        );
    }

    #[tokio::test]
    async fn unreachable_server_fails_each_call_without_caching_the_failure() -> TestResult {
        let cache = RedisCartCache::new(UNREACHABLE, "trolley", Duration::from_millis(250))?;
        let owner = Owner::user("1");

        for _ in 0..2 {
            let result = cache.get(&owner).await;

            assert!(
                matches!(result, Err(CacheError::Unavailable(_) | CacheError::Timeout)),
                "expected an unavailable cache, got {result:?}"
            );
            assert!(cache.connection.lock().await.is_none());
        }

        Ok(())
    }

    #[test]
    fn keys_include_prefix_and_owner() {
        assert_eq!(
            cache_key("trolley", &Owner::user("42")),
            "trolley:cart:user:42"
        );
        assert_eq!(
            cache_key("trolley", &Owner::guest("abc")),
            "trolley:cart:guest:abc"
        );
    }
}

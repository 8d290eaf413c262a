//! Cart Cache
//!
//! Cache-aside in front of the cart store. Entries are disposable read copies: every write
//! goes to the store first and then invalidates the entry; the next read repopulates it.
//! Cache failures are logged and counted, never surfaced.

use std::time::Duration;

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::carts::models::{Cart, Owner};

pub mod flight;
pub mod layer;
pub mod memory;
pub mod metrics;
pub mod redis_backend;

pub use flight::SingleFlight;
pub use layer::{CachedStore, CartAccess, DirectStore};
pub use memory::MemoryCartCache;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use redis_backend::RedisCartCache;

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable")]
    Unavailable(#[from] redis::RedisError),

    #[error("cache call timed out")]
    Timeout,

    #[error("cache entry could not be encoded or decoded")]
    Serialization(#[from] serde_json::Error),
}

/// A cached copy of a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cart: Cart,
    pub version: u64,
    pub cached_at: Timestamp,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    pub fn new(cart: Cart, ttl: Duration) -> Self {
        Self {
            version: cart.version,
            cart,
            cached_at: Timestamp::now(),
            ttl_seconds: ttl.as_secs().max(1),
        }
    }

    /// Whether the entry is still within its TTL at `now`.
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        let ttl = SignedDuration::from_secs(i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX));

        now.duration_since(self.cached_at) < ttl
    }
}

#[automock]
#[async_trait]
/// Cart cache backend.
pub trait CartCache: Send + Sync {
    /// Return the cached entry for `owner`, if any.
    async fn get(&self, owner: &Owner) -> Result<Option<CacheEntry>, CacheError>;

    /// Store `entry` for `owner`, expiring after the entry's TTL.
    async fn set(&self, owner: &Owner, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Drop the entry for `owner`.
    async fn invalidate(&self, owner: &Owner) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_after_their_ttl() {
        let entry = CacheEntry::new(Cart::empty(Owner::user("1")), Duration::from_secs(30));

        let later = entry.cached_at + SignedDuration::from_secs(29);
        let expired = entry.cached_at + SignedDuration::from_secs(30);

        assert!(entry.is_fresh(later));
        assert!(!entry.is_fresh(expired));
    }

    #[test]
    fn ttl_is_at_least_one_second() {
        let entry = CacheEntry::new(Cart::empty(Owner::user("1")), Duration::from_millis(10));

        assert_eq!(entry.ttl_seconds, 1);
    }
}

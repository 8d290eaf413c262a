//! Cache Config

use std::time::Duration;

use clap::Args;

/// Cart cache settings. Without a Redis URL carts are read straight from the store.
#[derive(Debug, Args)]
pub struct CacheConfig {
    /// Redis connection string
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Prefix for cache keys
    #[arg(long, env = "CACHE_PREFIX", default_value = "trolley")]
    pub cache_prefix: String,

    /// Lifetime of a cached cart in seconds
    #[arg(long, env = "CACHE_TTL_SECONDS", default_value_t = 300_u64)]
    pub cache_ttl_seconds: u64,

    /// Deadline for a single cache call in milliseconds
    #[arg(long, env = "CACHE_TIMEOUT_MS", default_value_t = 250_u64)]
    pub cache_timeout_ms: u64,
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }
}

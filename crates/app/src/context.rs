//! App Context

use std::sync::Arc;

use sqlx::{PgPool, migrate::MigrateError};
use thiserror::Error;
use tracing::{info, warn};
use trolley::rules::{PricingRules, RulesError};

use crate::{
    config::{AppConfig, CacheConfig},
    database,
    domain::{
        cache::{CacheMetricsSnapshot, CachedStore, CartAccess, DirectStore, RedisCartCache},
        carts::{CartStore, CartsService, DefaultCartsService, PgCartStore},
        pricing::CartPricing,
        products::PgProductCatalog,
    },
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("failed to apply database migrations")]
    Migrate(#[source] MigrateError),

    #[error("failed to load pricing rules")]
    Rules(#[source] RulesError),
}

/// Composition root: owns the connections and wires the carts service.
#[derive(Clone)]
pub struct AppContext {
    pub carts: Arc<dyn CartsService>,
    access: Arc<dyn CartAccess>,
    pool: PgPool,
}

impl AppContext {
    /// Connect to the store, and to Redis when configured, and build the carts service.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be reached or the pricing rules cannot be
    /// loaded. An unusable cache never fails startup.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppInitError> {
        let rules = PricingRules::from_path(&config.pricing.pricing_rules)
            .map_err(AppInitError::Rules)?;

        let pool = Self::connect_database(config).await?;

        let store: Arc<dyn CartStore> =
            Arc::new(PgCartStore::new(pool.clone(), config.timeouts.store()));

        let access = cart_access(store, &config.cache);

        let catalog = Arc::new(PgProductCatalog::new(pool.clone()));

        let carts = DefaultCartsService::new(
            Arc::clone(&access),
            catalog.clone(),
            catalog,
            CartPricing::new(rules),
            config.timeouts.oracle(),
        );

        Ok(Self {
            carts: Arc::new(carts),
            access,
            pool,
        })
    }

    /// Connect to the database and apply pending migrations, without building services.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be reached or a migration fails.
    pub async fn migrate(config: &AppConfig) -> Result<(), AppInitError> {
        let pool = Self::connect_database(config).await?;

        database::migrate(&pool)
            .await
            .map_err(AppInitError::Migrate)?;

        pool.close().await;

        Ok(())
    }

    async fn connect_database(config: &AppConfig) -> Result<PgPool, AppInitError> {
        database::connect(&config.database.database_url)
            .await
            .map_err(AppInitError::Database)
    }

    /// Cache counters, when a cache is in use.
    pub fn cache_metrics(&self) -> Option<CacheMetricsSnapshot> {
        self.access.metrics()
    }

    /// Close the database pool.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Put the Redis cache in front of `store` when one is configured.
///
/// Redis is connected lazily, so an outage only makes each call fall back to the store. A
/// URL that cannot be parsed disables the cache.
fn cart_access(store: Arc<dyn CartStore>, config: &CacheConfig) -> Arc<dyn CartAccess> {
    let Some(url) = &config.redis_url else {
        return Arc::new(DirectStore::new(store));
    };

    match RedisCartCache::new(url, config.cache_prefix.clone(), config.timeout()) {
        Ok(cache) => {
            info!(prefix = %config.cache_prefix, "cart cache enabled");

            Arc::new(CachedStore::new(store, Arc::new(cache), config.ttl()))
        }
        Err(error) => {
            warn!(error = %error, "invalid cart cache URL, reading carts from the store");

            Arc::new(DirectStore::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::domain::{
        carts::{
            MemoryCartStore,
            models::{CartItemUuid, NewCartItem, Owner},
        },
        products::models::ProductUuid,
    };

    use super::*;

    fn cache_config(redis_url: Option<&str>) -> CacheConfig {
        CacheConfig {
            redis_url: redis_url.map(str::to_string),
            cache_prefix: "trolley".to_string(),
            cache_ttl_seconds: 60,
            cache_timeout_ms: 250,
        }
    }

    #[tokio::test]
    async fn redis_outage_falls_back_to_the_store() -> TestResult {
        let access = cart_access(
            Arc::new(MemoryCartStore::new()),
            &cache_config(Some("redis://127.0.0.1:1")),
        );
        let owner = Owner::guest("g");

        access
            .add_item(
                &owner,
                NewCartItem {
                    uuid: CartItemUuid::new(),
                    product_uuid: ProductUuid::new(),
                    sku: None,
                    quantity: 2,
                    price: 10_00,
                },
            )
            .await?;

        assert_eq!(access.item_count(&owner).await?, 2);

        let metrics = access.metrics().ok_or("expected the cached variant")?;

        assert_eq!(metrics.read_fallbacks, 1);
        assert_eq!(metrics.invalidate_fallbacks, 1);

        Ok(())
    }

    #[test]
    fn no_redis_url_reads_the_store_directly() {
        let access = cart_access(Arc::new(MemoryCartStore::new()), &cache_config(None));

        assert!(access.metrics().is_none());
    }

    #[test]
    fn invalid_redis_url_reads_the_store_directly() {
        let access = cart_access(
            Arc::new(MemoryCartStore::new()),
            &cache_config(Some("not a url")),
        );

        assert!(access.metrics().is_none());
    }
}

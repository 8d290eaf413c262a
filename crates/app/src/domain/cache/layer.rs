//! Cart access with and without the cache.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::FxHashMap;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use crate::domain::{
    cache::{
        CacheEntry, CartCache,
        flight::SingleFlight,
        metrics::{CacheMetrics, CacheMetricsSnapshot},
    },
    carts::{
        errors::StoreError,
        models::{Cart, CartItem, ItemWrite, NewCartItem, Owner},
        store::CartStore,
    },
};

/// Read and write path to carts used by the services.
#[async_trait]
pub trait CartAccess: Send + Sync {
    /// Read a cart, possibly from cache.
    async fn get_cart(&self, owner: &Owner) -> Result<Cart, StoreError>;

    /// Read a cart from the store, bypassing the cache, as the base of a write.
    async fn load_for_write(&self, owner: &Owner) -> Result<Cart, StoreError>;

    async fn add_item(&self, owner: &Owner, item: NewCartItem) -> Result<CartItem, StoreError>;

    async fn commit(
        &self,
        owner: &Owner,
        expected_version: u64,
        writes: &[ItemWrite],
    ) -> Result<u64, StoreError>;

    /// Drop any cached copy of the owner's cart.
    async fn invalidate(&self, owner: &Owner);

    async fn item_count(&self, owner: &Owner) -> Result<u64, StoreError> {
        Ok(self.get_cart(owner).await?.item_count())
    }

    fn metrics(&self) -> Option<CacheMetricsSnapshot> {
        None
    }
}

/// Uncached access straight to the store.
#[derive(Clone)]
pub struct DirectStore {
    store: Arc<dyn CartStore>,
}

impl DirectStore {
    pub fn new(store: Arc<dyn CartStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CartAccess for DirectStore {
    async fn get_cart(&self, owner: &Owner) -> Result<Cart, StoreError> {
        self.store.load_cart(owner).await
    }

    async fn load_for_write(&self, owner: &Owner) -> Result<Cart, StoreError> {
        self.store.load_cart(owner).await
    }

    async fn add_item(&self, owner: &Owner, item: NewCartItem) -> Result<CartItem, StoreError> {
        Ok(self.store.add_item(owner, item).await?.0)
    }

    async fn commit(
        &self,
        owner: &Owner,
        expected_version: u64,
        writes: &[ItemWrite],
    ) -> Result<u64, StoreError> {
        self.store.commit(owner, expected_version, writes).await
    }

    async fn invalidate(&self, _owner: &Owner) {}
}

/// Lowest version the cache may serve for an owner after a write.
#[derive(Debug, Clone, Copy)]
struct Floor {
    version: u64,
    raised_at: Instant,
}

impl Floor {
    /// Every entry cached before the write has expired once a TTL has passed.
    fn expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.raised_at) > ttl
    }
}

/// Cache-aside access.
///
/// Reads are served from the cache when the entry is fresh and not older than the last
/// version this process committed for the owner. Misses are loaded from the store once per
/// owner however many readers are waiting. Writes go to the store first, then evict.
pub struct CachedStore {
    store: Arc<dyn CartStore>,
    cache: Arc<dyn CartCache>,
    ttl: Duration,
    flights: SingleFlight<Owner, Cart>,
    floors: Mutex<FxHashMap<Owner, Floor>>,
    metrics: Arc<CacheMetrics>,
}

impl CachedStore {
    pub fn new(store: Arc<dyn CartStore>, cache: Arc<dyn CartCache>, ttl: Duration) -> Self {
        Self {
            store,
            cache,
            ttl,
            flights: SingleFlight::new(),
            floors: Mutex::new(FxHashMap::default()),
            metrics: Arc::new(CacheMetrics::default()),
        }
    }

    pub fn cache_metrics(&self) -> Arc<CacheMetrics> {
        Arc::clone(&self.metrics)
    }

    async fn floor(&self, owner: &Owner) -> u64 {
        let now = Instant::now();

        self.floors
            .lock()
            .await
            .get(owner)
            .filter(|floor| !floor.expired(now, self.ttl))
            .map_or(0, |floor| floor.version)
    }

    async fn raise_floor(&self, owner: &Owner, version: u64) {
        let now = Instant::now();
        let mut floors = self.floors.lock().await;

        floors.retain(|_, floor| !floor.expired(now, self.ttl));

        let floor = floors.entry(owner.clone()).or_insert(Floor {
            version,
            raised_at: now,
        });

        floor.version = floor.version.max(version);
        floor.raised_at = now;
    }

    #[cfg(test)]
    async fn tracked_floors(&self) -> usize {
        self.floors.lock().await.len()
    }

    async fn fill(&self, owner: &Owner) -> Result<Cart, StoreError> {
        CacheMetrics::record(&self.metrics.loads);

        let cart = self.store.load_cart(owner).await?;

        if cart.version < self.floor(owner).await {
            debug!(owner = %owner, version = cart.version, "not caching superseded cart");

            return Ok(cart);
        }

        let entry = CacheEntry::new(cart.clone(), self.ttl);

        if let Err(error) = self.cache.set(owner, &entry).await {
            warn!(owner = %owner, error = %error, "failed to populate cart cache");
            CacheMetrics::record(&self.metrics.write_fallbacks);
        }

        Ok(cart)
    }

    async fn evict(&self, owner: &Owner) {
        self.flights.forget(owner).await;

        if let Err(error) = self.cache.invalidate(owner).await {
            warn!(owner = %owner, error = %error, "failed to invalidate cart cache");
            CacheMetrics::record(&self.metrics.invalidate_fallbacks);
        }
    }

    async fn written(&self, owner: &Owner, version: u64) {
        self.raise_floor(owner, version).await;
        self.evict(owner).await;
    }

    /// A timed out write may still land, so the cached copy can no longer be trusted.
    async fn timed_out(&self, owner: &Owner) -> StoreError {
        self.evict(owner).await;

        StoreError::Timeout
    }
}

#[async_trait]
impl CartAccess for CachedStore {
    async fn get_cart(&self, owner: &Owner) -> Result<Cart, StoreError> {
        let floor = self.floor(owner).await;

        match self.cache.get(owner).await {
            Ok(Some(entry)) if entry.version >= floor && entry.is_fresh(Timestamp::now()) => {
                CacheMetrics::record(&self.metrics.hits);

                return Ok(entry.cart);
            }
            Ok(Some(_)) => CacheMetrics::record(&self.metrics.stale),
            Ok(None) => CacheMetrics::record(&self.metrics.misses),
            Err(error) => {
                warn!(owner = %owner, error = %error, "cart cache read failed, using store");
                CacheMetrics::record(&self.metrics.read_fallbacks);
            }
        }

        self.flights.run(owner, || self.fill(owner)).await
    }

    async fn load_for_write(&self, owner: &Owner) -> Result<Cart, StoreError> {
        self.store.load_cart(owner).await
    }

    async fn add_item(&self, owner: &Owner, item: NewCartItem) -> Result<CartItem, StoreError> {
        let (item, version) = match self.store.add_item(owner, item).await {
            Ok(added) => added,
            Err(StoreError::Timeout) => return Err(self.timed_out(owner).await),
            Err(error) => return Err(error),
        };

        self.written(owner, version).await;

        Ok(item)
    }

    async fn commit(
        &self,
        owner: &Owner,
        expected_version: u64,
        writes: &[ItemWrite],
    ) -> Result<u64, StoreError> {
        let version = match self.store.commit(owner, expected_version, writes).await {
            Ok(version) => version,
            Err(StoreError::Timeout) => return Err(self.timed_out(owner).await),
            Err(error) => return Err(error),
        };

        if !writes.is_empty() {
            self.written(owner, version).await;
        }

        Ok(version)
    }

    async fn invalidate(&self, owner: &Owner) {
        self.evict(owner).await;
    }

    fn metrics(&self) -> Option<CacheMetricsSnapshot> {
        Some(self.metrics.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use testresult::TestResult;

    use crate::domain::{
        cache::{CacheError, MemoryCartCache, MockCartCache},
        carts::{MemoryCartStore, models::CartItemUuid},
        products::models::ProductUuid,
    };

    use super::*;

    fn new_item(quantity: u32) -> NewCartItem {
        NewCartItem {
            uuid: CartItemUuid::new(),
            product_uuid: ProductUuid::new(),
            sku: None,
            quantity,
            price: 10_00,
        }
    }

    fn cached(store: Arc<dyn CartStore>, cache: Arc<dyn CartCache>) -> CachedStore {
        CachedStore::new(store, cache, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn reads_observe_own_writes() -> TestResult {
        let layer = cached(
            Arc::new(MemoryCartStore::new()),
            Arc::new(MemoryCartCache::new()),
        );
        let owner = Owner::user("1");

        assert_eq!(layer.get_cart(&owner).await?.version, 0);

        let item = layer.add_item(&owner, new_item(2)).await?;

        let cart = layer.get_cart(&owner).await?;

        assert_eq!(cart.version, 1);
        assert_eq!(cart.item_count(), 2);

        layer
            .commit(
                &owner,
                1,
                &[ItemWrite::SetQuantity {
                    item: item.uuid,
                    quantity: 5,
                }],
            )
            .await?;

        assert_eq!(layer.item_count(&owner).await?, 5);

        Ok(())
    }

    #[tokio::test]
    async fn repeated_reads_hit_the_cache() -> TestResult {
        let layer = cached(
            Arc::new(MemoryCartStore::new()),
            Arc::new(MemoryCartCache::new()),
        );
        let owner = Owner::user("1");

        layer.add_item(&owner, new_item(1)).await?;

        layer.get_cart(&owner).await?;
        layer.get_cart(&owner).await?;
        layer.get_cart(&owner).await?;

        let metrics = layer.metrics().ok_or("no metrics")?;

        assert_eq!(metrics.loads, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.hits, 2);

        Ok(())
    }

    struct SlowStore {
        inner: MemoryCartStore,
        delay: Duration,
    }

    #[async_trait]
    impl CartStore for SlowStore {
        async fn load_cart(&self, owner: &Owner) -> Result<Cart, StoreError> {
            tokio::time::sleep(self.delay).await;

            self.inner.load_cart(owner).await
        }

        async fn add_item(
            &self,
            owner: &Owner,
            item: NewCartItem,
        ) -> Result<(CartItem, u64), StoreError> {
            self.inner.add_item(owner, item).await
        }

        async fn commit(
            &self,
            owner: &Owner,
            expected_version: u64,
            writes: &[ItemWrite],
        ) -> Result<u64, StoreError> {
            self.inner.commit(owner, expected_version, writes).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_load_once() -> TestResult {
        let layer = cached(
            Arc::new(SlowStore {
                inner: MemoryCartStore::new(),
                delay: Duration::from_millis(100),
            }),
            Arc::new(MemoryCartCache::new()),
        );
        let owner = Owner::guest("g");

        let (a, b, c) = tokio::join!(
            layer.get_cart(&owner),
            layer.get_cart(&owner),
            layer.get_cart(&owner),
        );

        assert_eq!(a?.version, 0);
        assert_eq!(b?.version, 0);
        assert_eq!(c?.version, 0);

        assert_eq!(layer.metrics().ok_or("no metrics")?.loads, 1);

        Ok(())
    }

    #[tokio::test]
    async fn cache_outage_falls_back_to_store() -> TestResult {
        let mut cache = MockCartCache::new();

        cache.expect_get().returning(|_| Err(CacheError::Timeout));
        cache.expect_set().returning(|_, _| Err(CacheError::Timeout));
        cache.expect_invalidate().returning(|_| Err(CacheError::Timeout));

        let layer = cached(Arc::new(MemoryCartStore::new()), Arc::new(cache));
        let owner = Owner::user("1");

        layer.add_item(&owner, new_item(3)).await?;

        assert_eq!(layer.item_count(&owner).await?, 3);

        let metrics = layer.metrics().ok_or("no metrics")?;

        assert_eq!(metrics.read_fallbacks, 1);
        assert_eq!(metrics.write_fallbacks, 1);
        assert_eq!(metrics.invalidate_fallbacks, 1);

        Ok(())
    }

    #[tokio::test]
    async fn entries_older_than_last_write_are_ignored() -> TestResult {
        let cache = Arc::new(MemoryCartCache::new());
        let layer = cached(Arc::new(MemoryCartStore::new()), cache.clone());
        let owner = Owner::user("1");

        layer.add_item(&owner, new_item(1)).await?;

        let superseded = CacheEntry::new(Cart::empty(owner.clone()), Duration::from_secs(60));
        cache.set(&owner, &superseded).await?;

        let cart = layer.get_cart(&owner).await?;

        assert_eq!(cart.version, 1);
        assert_eq!(layer.metrics().ok_or("no metrics")?.stale, 1);

        Ok(())
    }

    struct FlakyStore {
        inner: MemoryCartStore,
        failed: AtomicBool,
    }

    #[async_trait]
    impl CartStore for FlakyStore {
        async fn load_cart(&self, owner: &Owner) -> Result<Cart, StoreError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(StoreError::Timeout);
            }

            self.inner.load_cart(owner).await
        }

        async fn add_item(
            &self,
            owner: &Owner,
            item: NewCartItem,
        ) -> Result<(CartItem, u64), StoreError> {
            self.inner.add_item(owner, item).await
        }

        async fn commit(
            &self,
            owner: &Owner,
            expected_version: u64,
            writes: &[ItemWrite],
        ) -> Result<u64, StoreError> {
            self.inner.commit(owner, expected_version, writes).await
        }
    }

    #[tokio::test]
    async fn failed_loads_are_retried_by_the_next_reader() -> TestResult {
        let layer = cached(
            Arc::new(FlakyStore {
                inner: MemoryCartStore::new(),
                failed: AtomicBool::new(false),
            }),
            Arc::new(MemoryCartCache::new()),
        );
        let owner = Owner::user("1");

        let first = layer.get_cart(&owner).await;

        assert!(
            matches!(first, Err(StoreError::Timeout)),
            "expected Timeout, got {first:?}"
        );

        assert_eq!(layer.get_cart(&owner).await?.version, 0);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn version_floors_are_released_after_a_ttl() -> TestResult {
        let layer = cached(
            Arc::new(MemoryCartStore::new()),
            Arc::new(MemoryCartCache::new()),
        );

        for guest in 0..100 {
            let owner = Owner::guest(format!("g{guest}"));
            let item = layer.add_item(&owner, new_item(1)).await?;

            layer
                .commit(&owner, 1, &[ItemWrite::Remove { item: item.uuid }])
                .await?;
        }

        assert_eq!(layer.tracked_floors().await, 100);

        tokio::time::advance(Duration::from_secs(61)).await;

        let owner = Owner::user("1");
        layer.add_item(&owner, new_item(1)).await?;

        assert_eq!(layer.tracked_floors().await, 1);
        assert_eq!(layer.get_cart(&owner).await?.version, 1);

        Ok(())
    }

    #[tokio::test]
    async fn direct_store_passes_through() -> TestResult {
        let layer = DirectStore::new(Arc::new(MemoryCartStore::new()));
        let owner = Owner::user("1");

        let item = layer.add_item(&owner, new_item(2)).await?;
        let version = layer
            .commit(&owner, 1, &[ItemWrite::Remove { item: item.uuid }])
            .await?;

        assert_eq!(version, 2);
        assert_eq!(layer.item_count(&owner).await?, 0);
        assert!(layer.metrics().is_none());

        Ok(())
    }
}

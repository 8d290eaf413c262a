//! Sync Engine

use std::{sync::Arc, time::Duration};

use jiff::Timestamp;
use tracing::{debug, info, warn};

use crate::domain::{
    cache::CartAccess,
    carts::{
        errors::StoreError,
        models::{Cart, CartItem, ItemStatus, ItemWrite, Owner},
    },
    products::{ProductOracle, models::PriceAndStock, price_and_stock_within},
    sync::models::{ItemReport, SyncResult, ValidatedCart},
};

/// Reconciles cart lines with live price and stock.
#[derive(Clone)]
pub struct SyncEngine {
    access: Arc<dyn CartAccess>,
    oracle: Arc<dyn ProductOracle>,
    oracle_timeout: Duration,
}

/// Status a line should have given the live catalog entry.
pub fn status_for(item: &CartItem, live: Option<PriceAndStock>) -> ItemStatus {
    let Some(live) = live else {
        return ItemStatus::Removed;
    };

    if live.stock < item.quantity {
        ItemStatus::OutOfStock
    } else if live.price != item.price_snapshot {
        ItemStatus::PriceChanged
    } else {
        ItemStatus::Valid
    }
}

/// Live price to record on a line.
///
/// A price equal to the snapshot is only recorded when it is already stored, so a line that
/// matches the catalog never needs a write.
fn live_price(item: &CartItem, live: Option<PriceAndStock>) -> Option<u64> {
    match live {
        None => item.current_price,
        Some(live) if live.price == item.price_snapshot => {
            item.current_price.filter(|price| *price == live.price)
        }
        Some(live) => Some(live.price),
    }
}

impl SyncEngine {
    pub fn new(
        access: Arc<dyn CartAccess>,
        oracle: Arc<dyn ProductOracle>,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            access,
            oracle,
            oracle_timeout,
        }
    }

    /// Check every line in order. Returns the reports and whether any line went unchecked.
    async fn check(&self, cart: &Cart) -> (Vec<ItemReport>, bool) {
        let mut reports = Vec::with_capacity(cart.items.len());
        let mut partial = false;

        for item in &cart.items {
            let answer =
                price_and_stock_within(&*self.oracle, item.product_uuid, self.oracle_timeout).await;

            let report = match answer {
                Ok(live) => ItemReport {
                    item: item.uuid,
                    product: item.product_uuid,
                    previous: item.status,
                    status: status_for(item, live),
                    current_price: live_price(item, live),
                    checked: true,
                },
                Err(error) => {
                    warn!(
                        owner = %cart.owner,
                        product = %item.product_uuid,
                        error = %error,
                        "product lookup failed, keeping last known status"
                    );
                    partial = true;

                    ItemReport::unchecked(item)
                }
            };

            reports.push(report);
        }

        (reports, partial)
    }

    /// Check the cart without persisting anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be read.
    pub async fn validate_cart_items(&self, owner: &Owner) -> Result<ValidatedCart, StoreError> {
        let mut cart = self.access.get_cart(owner).await?;
        let (items, partial) = self.check(&cart).await;

        let now = Timestamp::now();

        for write in status_writes(&cart, &items) {
            cart.apply(&write, now)?;
        }

        let mut selected = cart.items.iter().filter(|item| item.selected).peekable();

        let ready_for_checkout = !partial
            && selected.peek().is_some()
            && selected.all(|item| item.status == ItemStatus::Valid);

        Ok(ValidatedCart {
            cart,
            items,
            partial,
            ready_for_checkout,
        })
    }

    /// Check the cart and persist changed statuses and live prices.
    ///
    /// Price snapshots are never overwritten. Nothing is written when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] if the cart changed while it was being checked.
    pub async fn sync_cart_items(&self, owner: &Owner) -> Result<SyncResult, StoreError> {
        let cart = self.access.load_for_write(owner).await?;
        let (items, partial) = self.check(&cart).await;

        let writes = status_writes(&cart, &items);

        if writes.is_empty() {
            debug!(owner = %owner, version = cart.version, "cart already in sync");

            return Ok(SyncResult {
                version: cart.version,
                items,
                changed: 0,
                partial,
            });
        }

        let version = self.access.commit(owner, cart.version, &writes).await?;

        info!(owner = %owner, version, changed = writes.len(), partial, "synced cart");

        Ok(SyncResult {
            version,
            items,
            changed: writes.len(),
            partial,
        })
    }

    /// Delete out-of-stock and removed lines. Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be read or changed concurrently.
    pub async fn clean_invalid_items(&self, owner: &Owner) -> Result<usize, StoreError> {
        let cart = self.access.load_for_write(owner).await?;

        let writes: Vec<ItemWrite> = cart
            .items
            .iter()
            .filter(|item| item.status.is_invalid())
            .map(|item| ItemWrite::Remove { item: item.uuid })
            .collect();

        if writes.is_empty() {
            return Ok(0);
        }

        self.access.commit(owner, cart.version, &writes).await?;

        info!(owner = %owner, removed = writes.len(), "cleaned invalid cart items");

        Ok(writes.len())
    }
}

fn status_writes(cart: &Cart, reports: &[ItemReport]) -> Vec<ItemWrite> {
    cart.items
        .iter()
        .zip(reports)
        .filter(|(item, report)| report.is_change_of(item))
        .map(|(_, report)| ItemWrite::SetStatus {
            item: report.item,
            status: report.status,
            current_price: report.current_price,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashMap;
    use testresult::TestResult;

    use crate::domain::{
        cache::{CachedStore, DirectStore, MemoryCartCache},
        carts::{
            MemoryCartStore,
            models::{CartItemUuid, NewCartItem},
        },
        products::{MockProductOracle, ProductOracleError, models::ProductUuid},
    };

    use super::*;

    fn oracle(catalog: FxHashMap<ProductUuid, PriceAndStock>) -> Arc<dyn ProductOracle> {
        let mut oracle = MockProductOracle::new();

        oracle
            .expect_price_and_stock()
            .returning(move |product| Ok(catalog.get(&product).copied()));

        Arc::new(oracle)
    }

    fn direct() -> Arc<dyn CartAccess> {
        Arc::new(DirectStore::new(Arc::new(MemoryCartStore::new())))
    }

    fn engine(access: Arc<dyn CartAccess>, oracle: Arc<dyn ProductOracle>) -> SyncEngine {
        SyncEngine::new(access, oracle, Duration::from_secs(1))
    }

    async fn add(
        access: &dyn CartAccess,
        owner: &Owner,
        product: ProductUuid,
        quantity: u32,
        price: u64,
    ) -> Result<CartItem, StoreError> {
        access
            .add_item(
                owner,
                NewCartItem {
                    uuid: CartItemUuid::new(),
                    product_uuid: product,
                    sku: None,
                    quantity,
                    price,
                },
            )
            .await
    }

    #[tokio::test]
    async fn price_changes_are_flagged_without_touching_snapshot() -> TestResult {
        let access = direct();
        let owner = Owner::user("1");
        let product = ProductUuid::new();

        add(&*access, &owner, product, 1, 10_00).await?;

        let catalog = FxHashMap::from_iter([(product, PriceAndStock { price: 12_00, stock: 5 })]);
        let sync = engine(access.clone(), oracle(catalog));

        let result = sync.sync_cart_items(&owner).await?;

        assert_eq!(result.changed, 1);
        assert!(!result.partial);

        let cart = access.get_cart(&owner).await?;
        let line = cart.items.first().ok_or("missing line")?;

        assert_eq!(line.status, ItemStatus::PriceChanged);
        assert_eq!(line.price_snapshot, 10_00);
        assert_eq!(line.current_price, Some(12_00));

        Ok(())
    }

    #[tokio::test]
    async fn matching_catalog_leaves_the_cart_unwritten() -> TestResult {
        let access = direct();
        let owner = Owner::user("1");
        let product = ProductUuid::new();

        add(&*access, &owner, product, 2, 10_00).await?;

        let catalog = FxHashMap::from_iter([(product, PriceAndStock { price: 10_00, stock: 5 })]);
        let result = engine(access.clone(), oracle(catalog))
            .sync_cart_items(&owner)
            .await?;

        assert_eq!(result.changed, 0);
        assert_eq!(result.version, 1);
        assert_eq!(
            result.items.first().map(|report| (report.status, report.current_price)),
            Some((ItemStatus::Valid, None))
        );
        assert_eq!(access.get_cart(&owner).await?.version, 1);

        Ok(())
    }

    #[tokio::test]
    async fn price_returning_to_snapshot_clears_the_live_price() -> TestResult {
        let access = direct();
        let owner = Owner::user("1");
        let product = ProductUuid::new();

        add(&*access, &owner, product, 1, 10_00).await?;

        let raised = FxHashMap::from_iter([(product, PriceAndStock { price: 12_00, stock: 5 })]);
        engine(access.clone(), oracle(raised))
            .sync_cart_items(&owner)
            .await?;

        let restored = FxHashMap::from_iter([(product, PriceAndStock { price: 10_00, stock: 5 })]);
        let sync = engine(access.clone(), oracle(restored));

        let result = sync.sync_cart_items(&owner).await?;

        assert_eq!(result.changed, 1);

        let cart = access.get_cart(&owner).await?;
        let line = cart.items.first().ok_or("missing line")?;

        assert_eq!(line.status, ItemStatus::Valid);
        assert_eq!(line.current_price, None);

        let again = sync.sync_cart_items(&owner).await?;

        assert_eq!(again.changed, 0);
        assert_eq!(again.version, result.version);

        Ok(())
    }

    #[tokio::test]
    async fn confirmed_prices_stay_in_sync() -> TestResult {
        let access = direct();
        let owner = Owner::user("1");
        let product = ProductUuid::new();

        let line = add(&*access, &owner, product, 1, 10_00).await?;

        let catalog = FxHashMap::from_iter([(product, PriceAndStock { price: 12_00, stock: 5 })]);
        let sync = engine(access.clone(), oracle(catalog));

        let synced = sync.sync_cart_items(&owner).await?;

        let confirmed = access
            .commit(
                &owner,
                synced.version,
                &[ItemWrite::ConfirmPrice { item: line.uuid }],
            )
            .await?;

        let result = sync.sync_cart_items(&owner).await?;

        assert_eq!(result.changed, 0);
        assert_eq!(result.version, confirmed);
        assert_eq!(
            result.items.first().map(|report| report.status),
            Some(ItemStatus::Valid)
        );

        Ok(())
    }

    #[tokio::test]
    async fn syncing_twice_changes_nothing_the_second_time() -> TestResult {
        let access = direct();
        let owner = Owner::user("1");
        let (gone, scarce) = (ProductUuid::new(), ProductUuid::new());

        add(&*access, &owner, gone, 1, 10_00).await?;
        add(&*access, &owner, scarce, 3, 5_00).await?;

        let catalog = FxHashMap::from_iter([(scarce, PriceAndStock { price: 5_00, stock: 2 })]);
        let sync = engine(access.clone(), oracle(catalog));

        let first = sync.sync_cart_items(&owner).await?;
        let second = sync.sync_cart_items(&owner).await?;

        let statuses: Vec<ItemStatus> = first.items.iter().map(|report| report.status).collect();

        assert_eq!(statuses, vec![ItemStatus::Removed, ItemStatus::OutOfStock]);
        assert_eq!(second.changed, 0);
        assert_eq!(second.version, first.version);

        Ok(())
    }

    #[tokio::test]
    async fn oracle_failures_produce_partial_results() -> TestResult {
        let access = direct();
        let owner = Owner::user("1");

        add(&*access, &owner, ProductUuid::new(), 1, 10_00).await?;

        let mut oracle = MockProductOracle::new();
        oracle
            .expect_price_and_stock()
            .returning(|_| Err(ProductOracleError::Timeout));

        let sync = engine(access.clone(), Arc::new(oracle));

        let result = sync.sync_cart_items(&owner).await?;

        assert!(result.partial);
        assert_eq!(result.changed, 0);
        assert_eq!(
            access.get_cart(&owner).await?.items.first().map(|line| line.status),
            Some(ItemStatus::Valid)
        );

        let validated = sync.validate_cart_items(&owner).await?;

        assert!(!validated.ready_for_checkout);

        Ok(())
    }

    #[tokio::test]
    async fn validation_does_not_persist() -> TestResult {
        let access = direct();
        let owner = Owner::user("1");
        let (fine, repriced) = (ProductUuid::new(), ProductUuid::new());

        add(&*access, &owner, fine, 1, 10_00).await?;
        add(&*access, &owner, repriced, 1, 10_00).await?;

        let catalog = FxHashMap::from_iter([
            (fine, PriceAndStock { price: 10_00, stock: 9 }),
            (repriced, PriceAndStock { price: 8_00, stock: 9 }),
        ]);
        let sync = engine(access.clone(), oracle(catalog));

        let validated = sync.validate_cart_items(&owner).await?;

        assert!(!validated.ready_for_checkout);
        assert_eq!(
            validated.cart.items.get(1).map(|line| line.status),
            Some(ItemStatus::PriceChanged)
        );

        let stored = access.get_cart(&owner).await?;

        assert_eq!(stored.version, 2);
        assert!(stored.items.iter().all(|line| line.status == ItemStatus::Valid));

        Ok(())
    }

    #[tokio::test]
    async fn clean_removes_only_invalid_lines() -> TestResult {
        let access = direct();
        let owner = Owner::user("1");
        let (kept, gone) = (ProductUuid::new(), ProductUuid::new());

        add(&*access, &owner, kept, 1, 10_00).await?;
        add(&*access, &owner, gone, 1, 10_00).await?;

        let catalog = FxHashMap::from_iter([(kept, PriceAndStock { price: 10_00, stock: 1 })]);
        let sync = engine(access.clone(), oracle(catalog));

        sync.sync_cart_items(&owner).await?;

        assert_eq!(sync.clean_invalid_items(&owner).await?, 1);
        assert_eq!(sync.clean_invalid_items(&owner).await?, 0);

        let cart = access.get_cart(&owner).await?;

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items.first().map(|line| line.product_uuid), Some(kept));

        Ok(())
    }

    #[tokio::test]
    async fn sync_evicts_cached_cart() -> TestResult {
        let access: Arc<dyn CartAccess> = Arc::new(CachedStore::new(
            Arc::new(MemoryCartStore::new()),
            Arc::new(MemoryCartCache::new()),
            Duration::from_secs(60),
        ));
        let owner = Owner::guest("g");
        let product = ProductUuid::new();

        add(&*access, &owner, product, 4, 10_00).await?;

        assert_eq!(
            access.get_cart(&owner).await?.items.first().map(|line| line.status),
            Some(ItemStatus::Valid)
        );

        let catalog = FxHashMap::from_iter([(product, PriceAndStock { price: 10_00, stock: 1 })]);
        engine(access.clone(), oracle(catalog))
            .sync_cart_items(&owner)
            .await?;

        assert_eq!(
            access.get_cart(&owner).await?.items.first().map(|line| line.status),
            Some(ItemStatus::OutOfStock)
        );

        Ok(())
    }
}

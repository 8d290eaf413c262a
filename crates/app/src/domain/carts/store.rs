//! Cart Store

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use sqlx::PgPool;
use tracing::debug;

use crate::{
    deadline::bounded,
    domain::carts::{
        errors::StoreError,
        models::{Cart, CartItem, ItemWrite, NewCartItem, Owner},
        repositories::{PgCartItemsRepository, PgCartsRepository},
    },
};

#[automock]
#[async_trait]
/// Authoritative cart persistence with optimistic versioning.
pub trait CartStore: Send + Sync {
    /// Load the owner's cart; an unwritten cart is empty at version 0.
    async fn load_cart(&self, owner: &Owner) -> Result<Cart, StoreError>;

    /// Add a line, coalescing with an existing line for the same product and SKU.
    ///
    /// Coalescing adds the quantity, re-captures the price snapshot and resets the status
    /// to valid. Returns the stored line and the new cart version.
    async fn add_item(
        &self,
        owner: &Owner,
        item: NewCartItem,
    ) -> Result<(CartItem, u64), StoreError>;

    /// Apply `writes` atomically if the cart is still at `expected_version`.
    ///
    /// Returns the new cart version, or the unchanged version when `writes` is empty.
    async fn commit(
        &self,
        owner: &Owner,
        expected_version: u64,
        writes: &[ItemWrite],
    ) -> Result<u64, StoreError>;
}

/// Postgres-backed cart store.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
    timeout: Duration,
    carts: PgCartsRepository,
    items: PgCartItemsRepository,
}

impl PgCartStore {
    #[must_use]
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self {
            pool,
            timeout,
            carts: PgCartsRepository::new(),
            items: PgCartItemsRepository::new(),
        }
    }

    async fn load(&self, owner: &Owner) -> Result<Cart, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = self.carts.get_cart(&mut tx, owner).await? else {
            tx.commit().await?;

            return Ok(Cart::empty(owner.clone()));
        };

        let items = self.items.get_cart_items(&mut tx, row.uuid).await?;

        tx.commit().await?;

        Ok(Cart {
            owner: owner.clone(),
            version: row.version,
            items,
            updated_at: Some(row.updated_at),
        })
    }

    async fn add(&self, owner: &Owner, item: NewCartItem) -> Result<(CartItem, u64), StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = self.carts.upsert_cart(&mut tx, owner).await?;
        let item = self.items.upsert_cart_item(&mut tx, row.uuid, item).await?;

        tx.commit().await?;

        Ok((item, row.version))
    }

    async fn write(
        &self,
        owner: &Owner,
        expected_version: u64,
        writes: &[ItemWrite],
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = self.carts.lock_cart(&mut tx, owner).await? else {
            return unwritten_cart(expected_version, writes);
        };

        if row.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: row.version,
            });
        }

        if writes.is_empty() {
            tx.commit().await?;

            return Ok(row.version);
        }

        for write in writes {
            let affected = self.items.apply_write(&mut tx, row.uuid, write).await?;

            if let Some(item) = write.target().filter(|_| affected == 0) {
                return Err(StoreError::ItemNotFound(item));
            }
        }

        let bumped = self.carts.bump_version(&mut tx, row.uuid).await?;

        tx.commit().await?;

        debug!(owner = %owner, version = bumped.version, writes = writes.len(), "committed cart");

        Ok(bumped.version)
    }
}

/// Outcome of a commit against a cart that was never written.
pub(crate) fn unwritten_cart(
    expected_version: u64,
    writes: &[ItemWrite],
) -> Result<u64, StoreError> {
    if expected_version != 0 {
        return Err(StoreError::VersionConflict {
            expected: expected_version,
            actual: 0,
        });
    }

    match writes.iter().find_map(ItemWrite::target) {
        Some(item) => Err(StoreError::ItemNotFound(item)),
        None => Ok(0),
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn load_cart(&self, owner: &Owner) -> Result<Cart, StoreError> {
        bounded(self.timeout, StoreError::Timeout, self.load(owner)).await
    }

    async fn add_item(
        &self,
        owner: &Owner,
        item: NewCartItem,
    ) -> Result<(CartItem, u64), StoreError> {
        bounded(self.timeout, StoreError::Timeout, self.add(owner, item)).await
    }

    async fn commit(
        &self,
        owner: &Owner,
        expected_version: u64,
        writes: &[ItemWrite],
    ) -> Result<u64, StoreError> {
        bounded(
            self.timeout,
            StoreError::Timeout,
            self.write(owner, expected_version, writes),
        )
        .await
    }
}

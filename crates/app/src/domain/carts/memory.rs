//! In-memory cart store.

use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;

use crate::domain::carts::{
    errors::StoreError,
    models::{Cart, CartItem, ItemStatus, ItemWrite, NewCartItem, Owner},
    store::{CartStore, unwritten_cart},
};

/// Process-local cart store with the same semantics as the Postgres store.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    carts: Mutex<FxHashMap<Owner, Cart>>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn load_cart(&self, owner: &Owner) -> Result<Cart, StoreError> {
        let carts = self.carts.lock().await;

        Ok(carts
            .get(owner)
            .cloned()
            .unwrap_or_else(|| Cart::empty(owner.clone())))
    }

    async fn add_item(
        &self,
        owner: &Owner,
        item: NewCartItem,
    ) -> Result<(CartItem, u64), StoreError> {
        let mut carts = self.carts.lock().await;
        let now = Timestamp::now();

        let cart = carts
            .entry(owner.clone())
            .or_insert_with(|| Cart::empty(owner.clone()));

        let existing = cart
            .items
            .iter_mut()
            .find(|line| line.product_uuid == item.product_uuid && line.sku == item.sku);

        let line = match existing {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or(StoreError::InvalidData)?;
                line.price_snapshot = item.price;
                line.current_price = None;
                line.status = ItemStatus::Valid;
                line.updated_at = now;

                line.clone()
            }
            None => {
                let line = CartItem {
                    uuid: item.uuid,
                    product_uuid: item.product_uuid,
                    sku: item.sku,
                    quantity: item.quantity,
                    price_snapshot: item.price,
                    current_price: None,
                    selected: true,
                    status: ItemStatus::Valid,
                    added_at: now,
                    updated_at: now,
                };

                cart.items.push(line.clone());

                line
            }
        };

        cart.version += 1;
        cart.updated_at = Some(now);

        Ok((line, cart.version))
    }

    async fn commit(
        &self,
        owner: &Owner,
        expected_version: u64,
        writes: &[ItemWrite],
    ) -> Result<u64, StoreError> {
        let mut carts = self.carts.lock().await;

        let Some(cart) = carts.get_mut(owner) else {
            return unwritten_cart(expected_version, writes);
        };

        if cart.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: cart.version,
            });
        }

        if writes.is_empty() {
            return Ok(cart.version);
        }

        let now = Timestamp::now();
        let mut next = cart.clone();

        for write in writes {
            next.apply(write, now)?;
        }

        next.version += 1;
        next.updated_at = Some(now);

        *cart = next;

        Ok(cart.version)
    }
}

//! Sync Models

use serde::Serialize;

use crate::domain::{
    carts::models::{Cart, CartItem, CartItemUuid, ItemStatus},
    products::models::ProductUuid,
};

/// Outcome of checking one line against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    pub item: CartItemUuid,
    pub product: ProductUuid,

    /// Status stored before the check.
    pub previous: ItemStatus,
    pub status: ItemStatus,
    pub current_price: Option<u64>,

    /// False when the catalog could not be asked; the line keeps its last known state.
    pub checked: bool,
}

impl ItemReport {
    pub(crate) fn unchecked(item: &CartItem) -> Self {
        Self {
            item: item.uuid,
            product: item.product_uuid,
            previous: item.status,
            status: item.status,
            current_price: item.current_price,
            checked: false,
        }
    }

    /// Whether the check disagrees with what is stored.
    pub fn is_change_of(&self, item: &CartItem) -> bool {
        self.checked && (self.status != item.status || self.current_price != item.current_price)
    }
}

/// Read-only validation of a cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedCart {
    /// The cart with checked statuses applied, not persisted.
    pub cart: Cart,
    pub items: Vec<ItemReport>,
    pub partial: bool,

    /// At least one line is selected, every selected line is valid and nothing was left
    /// unchecked.
    pub ready_for_checkout: bool,
}

/// Persisted outcome of a sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    pub version: u64,
    pub items: Vec<ItemReport>,

    /// Number of lines whose stored status or price was updated.
    pub changed: usize,
    pub partial: bool,
}

//! Cart Models

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{domain::products::models::ProductUuid, uuids::TypedUuid};

/// Cart Item UUID
pub type CartItemUuid = TypedUuid<CartItem>;

/// Who a cart belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    /// An authenticated user.
    User,

    /// An anonymous session.
    Guest,
}

impl OwnerKind {
    /// Stable textual form used in keys and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Guest => "guest",
        }
    }
}

/// Errors raised while parsing an owner.
#[derive(Debug, Error, PartialEq)]
pub enum OwnerParseError {
    #[error("owner must look like user:<id> or guest:<id>, got {0}")]
    Malformed(String),

    #[error("unknown owner kind {0}")]
    UnknownKind(String),
}

/// Cart owner, keyed by kind and identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub kind: OwnerKind,
    pub id: String,
}

impl Owner {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: OwnerKind::User,
            id: id.into(),
        }
    }

    pub fn guest(id: impl Into<String>) -> Self {
        Self {
            kind: OwnerKind::Guest,
            id: id.into(),
        }
    }
}

impl Display for Owner {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

impl FromStr for Owner {
    type Err = OwnerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, id)) = s.split_once(':') else {
            return Err(OwnerParseError::Malformed(s.to_string()));
        };

        if id.is_empty() {
            return Err(OwnerParseError::Malformed(s.to_string()));
        }

        match kind {
            "user" => Ok(Self::user(id)),
            "guest" => Ok(Self::guest(id)),
            other => Err(OwnerParseError::UnknownKind(other.to_string())),
        }
    }
}

/// Consistency status of a cart line against the live catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Valid,
    PriceChanged,
    OutOfStock,
    Removed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::PriceChanged => "price_changed",
            Self::OutOfStock => "out_of_stock",
            Self::Removed => "removed",
        }
    }

    /// Whether the line can no longer be bought as is and should be cleaned up.
    pub fn is_invalid(self) -> bool {
        matches!(self, Self::OutOfStock | Self::Removed)
    }
}

impl Display for ItemStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Unknown stored item status.
#[derive(Debug, Error, PartialEq)]
#[error("unknown item status {0}")]
pub struct UnknownItemStatus(pub String);

impl FromStr for ItemStatus {
    type Err = UnknownItemStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(Self::Valid),
            "price_changed" => Ok(Self::PriceChanged),
            "out_of_stock" => Ok(Self::OutOfStock),
            "removed" => Ok(Self::Removed),
            other => Err(UnknownItemStatus(other.to_string())),
        }
    }
}

/// Cart Model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub owner: Owner,

    /// Optimistic concurrency version; 0 for a cart that was never written.
    pub version: u64,

    /// Lines in the order they were first added.
    pub items: Vec<CartItem>,

    pub updated_at: Option<Timestamp>,
}

impl Cart {
    /// An unwritten cart.
    pub fn empty(owner: Owner) -> Self {
        Self {
            owner,
            version: 0,
            items: Vec::new(),
            updated_at: None,
        }
    }

    pub fn item(&self, uuid: CartItemUuid) -> Option<&CartItem> {
        self.items.iter().find(|item| item.uuid == uuid)
    }

    /// Find the line for a product and SKU.
    pub fn line(&self, product: ProductUuid, sku: Option<&str>) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.product_uuid == product && item.sku.as_deref() == sku)
    }

    /// Sum of quantities over lines that have not been removed from the catalog.
    pub fn item_count(&self) -> u64 {
        self.items
            .iter()
            .filter(|item| item.status != ItemStatus::Removed)
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Apply a single write in place.
    ///
    /// # Errors
    ///
    /// Returns [`MissingItem`] when the write targets a line that is not in the cart.
    pub fn apply(&mut self, write: &ItemWrite, now: Timestamp) -> Result<(), MissingItem> {
        match write {
            ItemWrite::SetQuantity { item, quantity } => {
                self.item_mut(*item)?.quantity = *quantity;
            }
            ItemWrite::SetSelected { item, selected } => {
                self.item_mut(*item)?.selected = *selected;
            }
            ItemWrite::ConfirmPrice { item } => {
                let line = self.item_mut(*item)?;

                if let Some(current) = line.current_price {
                    line.price_snapshot = current;
                }

                if line.status == ItemStatus::PriceChanged {
                    line.status = ItemStatus::Valid;
                }
            }
            ItemWrite::SetStatus {
                item,
                status,
                current_price,
            } => {
                let line = self.item_mut(*item)?;
                line.status = *status;
                line.current_price = *current_price;
            }
            ItemWrite::Remove { item } => {
                let before = self.items.len();
                self.items.retain(|line| line.uuid != *item);

                if self.items.len() == before {
                    return Err(MissingItem(*item));
                }

                return Ok(());
            }
            ItemWrite::SelectAll { selected } => {
                for line in &mut self.items {
                    line.selected = *selected;
                    line.updated_at = now;
                }

                return Ok(());
            }
            ItemWrite::Clear => {
                self.items.clear();

                return Ok(());
            }
        }

        if let Some(item) = write.target() {
            self.item_mut(item)?.updated_at = now;
        }

        Ok(())
    }

    fn item_mut(&mut self, uuid: CartItemUuid) -> Result<&mut CartItem, MissingItem> {
        self.items
            .iter_mut()
            .find(|item| item.uuid == uuid)
            .ok_or(MissingItem(uuid))
    }
}

/// A write referenced a line that is not in the cart.
#[derive(Debug, Error, PartialEq)]
#[error("cart item {0} not found")]
pub struct MissingItem(pub CartItemUuid);

/// CartItem Model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub uuid: CartItemUuid,
    pub product_uuid: ProductUuid,
    pub sku: Option<String>,
    pub quantity: u32,

    /// Unit price in minor units captured when the line was added or last confirmed.
    pub price_snapshot: u64,

    /// Last live unit price seen by a sync, for display.
    pub current_price: Option<u64>,

    pub selected: bool,
    pub status: ItemStatus,
    pub added_at: Timestamp,
    pub updated_at: Timestamp,
}

/// New Cart Item Model
#[derive(Debug, Clone, PartialEq)]
pub struct NewCartItem {
    pub uuid: CartItemUuid,
    pub product_uuid: ProductUuid,
    pub sku: Option<String>,
    pub quantity: u32,
    pub price: u64,
}

/// A single persisted change to a cart, committed in batches under one version bump.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemWrite {
    SetQuantity {
        item: CartItemUuid,
        quantity: u32,
    },
    SetSelected {
        item: CartItemUuid,
        selected: bool,
    },

    /// Accept the last live price as the new snapshot.
    ConfirmPrice {
        item: CartItemUuid,
    },
    SetStatus {
        item: CartItemUuid,
        status: ItemStatus,
        current_price: Option<u64>,
    },
    Remove {
        item: CartItemUuid,
    },
    SelectAll {
        selected: bool,
    },
    Clear,
}

impl ItemWrite {
    /// The line this write targets, if it targets a single line.
    pub fn target(&self) -> Option<CartItemUuid> {
        match self {
            Self::SetQuantity { item, .. }
            | Self::SetSelected { item, .. }
            | Self::ConfirmPrice { item }
            | Self::SetStatus { item, .. }
            | Self::Remove { item } => Some(*item),
            Self::SelectAll { .. } | Self::Clear => None,
        }
    }
}

/// Requested change to a single line.
///
/// A quantity of zero or less removes the line; the other fields are then ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub quantity: Option<i64>,
    pub selected: Option<bool>,
    pub confirm_price: bool,
}

impl ItemUpdate {
    /// Translate the update into store writes for `item`.
    ///
    /// # Errors
    ///
    /// Returns the offending quantity when it does not fit a line quantity.
    pub fn writes(&self, item: CartItemUuid) -> Result<Vec<ItemWrite>, i64> {
        let mut writes = Vec::new();

        if let Some(quantity) = self.quantity {
            if quantity <= 0 {
                return Ok(vec![ItemWrite::Remove { item }]);
            }

            let quantity = u32::try_from(quantity).map_err(|_err| quantity)?;

            writes.push(ItemWrite::SetQuantity { item, quantity });
        }

        if let Some(selected) = self.selected {
            writes.push(ItemWrite::SetSelected { item, selected });
        }

        if self.confirm_price {
            writes.push(ItemWrite::ConfirmPrice { item });
        }

        Ok(writes)
    }
}

/// An [`ItemUpdate`] addressed to a line, used in batch updates.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemChange {
    pub item: CartItemUuid,
    pub update: ItemUpdate,
}

/// Cart as presented to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub owner: Owner,
    pub version: u64,
    pub items: Vec<CartItem>,
    pub item_count: u64,
    pub selected_count: usize,
}

impl CartView {
    /// Build a view, hiding out-of-stock and removed lines unless `include_invalid` is set.
    pub fn new(cart: Cart, include_invalid: bool) -> Self {
        let item_count = cart.item_count();

        let items: Vec<CartItem> = cart
            .items
            .into_iter()
            .filter(|item| include_invalid || !item.status.is_invalid())
            .collect();

        let selected_count = items.iter().filter(|item| item.selected).count();

        Self {
            owner: cart.owner,
            version: cart.version,
            items,
            item_count,
            selected_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn item(quantity: u32, status: ItemStatus) -> CartItem {
        CartItem {
            uuid: CartItemUuid::new(),
            product_uuid: ProductUuid::new(),
            sku: None,
            quantity,
            price_snapshot: 10_00,
            current_price: None,
            selected: true,
            status,
            added_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn owner_round_trips_through_text() -> TestResult {
        let owner: Owner = "guest:abc-123".parse()?;

        assert_eq!(owner, Owner::guest("abc-123"));
        assert_eq!(owner.to_string(), "guest:abc-123");

        Ok(())
    }

    #[test]
    fn owner_rejects_unknown_kind_and_missing_id() {
        assert_eq!(
            "admin:1".parse::<Owner>(),
            Err(OwnerParseError::UnknownKind("admin".to_string()))
        );
        assert_eq!(
            "user:".parse::<Owner>(),
            Err(OwnerParseError::Malformed("user:".to_string()))
        );
    }

    #[test]
    fn item_status_round_trips_through_text() -> TestResult {
        for status in [
            ItemStatus::Valid,
            ItemStatus::PriceChanged,
            ItemStatus::OutOfStock,
            ItemStatus::Removed,
        ] {
            assert_eq!(status.as_str().parse::<ItemStatus>()?, status);
        }

        Ok(())
    }

    #[test]
    fn item_count_skips_removed_lines() {
        let mut cart = Cart::empty(Owner::user("1"));
        cart.items = vec![
            item(2, ItemStatus::Valid),
            item(3, ItemStatus::OutOfStock),
            item(7, ItemStatus::Removed),
        ];

        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn confirm_price_accepts_live_price() -> TestResult {
        let mut line = item(1, ItemStatus::PriceChanged);
        line.current_price = Some(12_00);
        let uuid = line.uuid;

        let mut cart = Cart::empty(Owner::user("1"));
        cart.items.push(line);

        cart.apply(&ItemWrite::ConfirmPrice { item: uuid }, Timestamp::now())?;

        let confirmed = cart.item(uuid).ok_or("missing line")?;

        assert_eq!(confirmed.price_snapshot, 12_00);
        assert_eq!(confirmed.status, ItemStatus::Valid);

        Ok(())
    }

    #[test]
    fn apply_rejects_unknown_item() {
        let mut cart = Cart::empty(Owner::user("1"));
        let missing = CartItemUuid::new();

        let result = cart.apply(&ItemWrite::Remove { item: missing }, Timestamp::now());

        assert_eq!(result, Err(MissingItem(missing)));
    }

    #[test]
    fn non_positive_quantity_becomes_removal() -> TestResult {
        let uuid = CartItemUuid::new();

        let update = ItemUpdate {
            quantity: Some(0),
            selected: Some(false),
            confirm_price: true,
        };

        assert_eq!(update.writes(uuid)?, vec![ItemWrite::Remove { item: uuid }]);

        Ok(())
    }

    #[test]
    fn oversized_quantity_is_rejected() {
        let update = ItemUpdate {
            quantity: Some(i64::MAX),
            ..ItemUpdate::default()
        };

        assert_eq!(update.writes(CartItemUuid::new()), Err(i64::MAX));
    }

    #[test]
    fn view_hides_invalid_lines_by_default() {
        let mut cart = Cart::empty(Owner::user("1"));
        cart.items = vec![item(1, ItemStatus::Valid), item(1, ItemStatus::OutOfStock)];

        assert_eq!(CartView::new(cart.clone(), false).items.len(), 1);
        assert_eq!(CartView::new(cart, true).items.len(), 2);
    }
}

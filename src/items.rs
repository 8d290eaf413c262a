//! Items

use rusty_money::{Money, iso};

/// A single cart line as seen by the calculation engine.
///
/// The snapshot price is the price captured when the line was added. A live price, when
/// known, is the most recent price reported by the catalogue and takes precedence for totals.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LineItem<'a> {
    snapshot_price: Money<'a, iso::Currency>,
    live_price: Option<Money<'a, iso::Currency>>,
    quantity: u32,
    selected: bool,
}

impl<'a> LineItem<'a> {
    /// Creates a new selected line with the given snapshot price and quantity.
    pub fn new(snapshot_price: Money<'a, iso::Currency>, quantity: u32) -> Self {
        Self {
            snapshot_price,
            live_price: None,
            quantity,
            selected: true,
        }
    }

    /// Attach the live catalogue price to the line.
    #[must_use]
    pub fn with_live_price(mut self, live_price: Option<Money<'a, iso::Currency>>) -> Self {
        self.live_price = live_price;
        self
    }

    /// Mark the line as selected (or not) for checkout.
    #[must_use]
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Returns the price used for totals: the live price if known, else the snapshot.
    pub fn unit_price(&self) -> &Money<'a, iso::Currency> {
        self.live_price.as_ref().unwrap_or(&self.snapshot_price)
    }

    /// Returns the price captured when the line was added.
    pub fn snapshot_price(&self) -> &Money<'a, iso::Currency> {
        &self.snapshot_price
    }

    /// Returns the line quantity.
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Whether the line takes part in checkout totals.
    pub const fn is_selected(&self) -> bool {
        self.selected
    }
}

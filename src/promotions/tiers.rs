//! Spend Tiers
//!
//! A spend tier grants a discount once the selected amount reaches its threshold
//! (e.g. spend £50 for £5 off, spend £200 for £25 off). Only the highest tier reached
//! applies.

use rusty_money::{Money, iso::Currency};

use crate::discounts::Discount;

/// A single spend threshold and the discount it unlocks.
#[derive(Debug, Clone)]
pub struct SpendTier<'a> {
    threshold: Money<'a, Currency>,
    discount: Discount<'a>,
}

impl<'a> SpendTier<'a> {
    /// Create a new tier.
    pub fn new(threshold: Money<'a, Currency>, discount: Discount<'a>) -> Self {
        Self {
            threshold,
            discount,
        }
    }

    /// Return the spend threshold.
    pub fn threshold(&self) -> &Money<'a, Currency> {
        &self.threshold
    }

    /// Return the discount granted by this tier.
    pub fn discount(&self) -> &Discount<'a> {
        &self.discount
    }

    /// Whether `amount` reaches this tier. Amounts in another currency never do.
    pub fn is_met_by(&self, amount: &Money<'_, Currency>) -> bool {
        amount.currency() == self.threshold.currency()
            && amount.to_minor_units() >= self.threshold.to_minor_units()
    }
}

/// Find the tier with the highest threshold met by `amount`, with its index.
pub fn best_tier<'t, 'a>(
    tiers: &'t [SpendTier<'a>],
    amount: &Money<'_, Currency>,
) -> Option<(usize, &'t SpendTier<'a>)> {
    tiers
        .iter()
        .enumerate()
        .filter(|(_, tier)| tier.is_met_by(amount))
        .max_by_key(|(_, tier)| tier.threshold.to_minor_units())
}

//! Cart Calculation
//!
//! Totals are computed in a fixed order so results are reproducible:
//!
//! 1. subtotal over every line,
//! 2. selected amount over selected lines,
//! 3. discount from the promotion service against the selected amount,
//! 4. shipping from the rate table against the selected amount,
//! 5. payable as `max(0, selected - discount) + shipping`.
//!
//! Only the payable amount and the shipping fee are rounded (half-up, to minor units).

use rust_decimal::{Decimal, prelude::FromPrimitive};
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    items::LineItem,
    pricing::{TotalPriceError, round_minor, total_price},
    promotions::{PromotionError, PromotionService},
    shipping::{ShippingError, ShippingRateTable},
};

/// Errors raised by the calculation engine.
#[derive(Debug, Error, PartialEq)]
pub enum CalculationError {
    /// A promotion (usually a coupon) could not be applied.
    #[error(transparent)]
    Promotion(#[from] PromotionError),

    /// Shipping could not be priced.
    #[error(transparent)]
    Shipping(#[from] ShippingError),

    /// Line totals could not be computed.
    #[error(transparent)]
    TotalPrice(#[from] TotalPriceError),
}

/// Derived cart totals. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CartCalculation<'a> {
    /// Sum over every line, selected or not.
    pub subtotal_amount: Money<'a, Currency>,

    /// Sum over selected lines.
    pub selected_amount: Money<'a, Currency>,

    /// Total promotion discount, rounded half-up for display.
    pub total_discount: Money<'a, Currency>,

    /// Shipping fee for the region.
    pub shipping_fee: Money<'a, Currency>,

    /// Amount to pay: `max(0, selected - discount) + shipping`.
    pub payable_amount: Money<'a, Currency>,

    /// Coupon that was applied, if any.
    pub applied_coupon: Option<String>,

    /// Index of the spend tier that was applied, if any.
    pub applied_tier: Option<usize>,
}

/// Calculation engine bound to a promotion service and a shipping rate table.
pub struct Calculator<'r> {
    promotions: &'r dyn PromotionService,
    shipping: &'r dyn ShippingRateTable,
}

impl std::fmt::Debug for Calculator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Calculator").finish_non_exhaustive()
    }
}

impl<'r> Calculator<'r> {
    /// Create a calculator over the given promotion and shipping sources.
    pub fn new(promotions: &'r dyn PromotionService, shipping: &'r dyn ShippingRateTable) -> Self {
        Self {
            promotions,
            shipping,
        }
    }

    /// Calculate cart totals.
    ///
    /// # Errors
    ///
    /// - [`CalculationError::Promotion`]: the coupon is unknown or ineligible, or a discount
    ///   could not be computed. Ineligible coupons are rejected, never ignored.
    /// - [`CalculationError::Shipping`]: the region cannot be priced.
    /// - [`CalculationError::TotalPrice`]: line totals overflowed or mixed currencies.
    pub fn calculate<'a>(
        &self,
        items: &[LineItem<'a>],
        currency: &'a Currency,
        region: &str,
        coupon: Option<&str>,
    ) -> Result<CartCalculation<'a>, CalculationError> {
        let subtotal_amount = total_price(items, currency, |_| true)?;
        let selected_amount = total_price(items, currency, LineItem::is_selected)?;

        let outcome = self.promotions.evaluate(&selected_amount, coupon)?;

        let selected = Decimal::from_i64(selected_amount.to_minor_units())
            .ok_or(TotalPriceError::Overflow)?;

        let discount = outcome.discount.max(Decimal::ZERO).min(selected);

        let shipping_fee = self.shipping_fee(&selected_amount, currency, region)?;

        let discounted = (selected - discount).max(Decimal::ZERO);
        let payable = round_minor(discounted)?
            .checked_add(shipping_fee.to_minor_units())
            .ok_or(TotalPriceError::Overflow)?;

        Ok(CartCalculation {
            subtotal_amount,
            selected_amount,
            total_discount: Money::from_minor(round_minor(discount)?, currency),
            shipping_fee,
            payable_amount: Money::from_minor(payable, currency),
            applied_coupon: outcome.applied_coupon,
            applied_tier: outcome.applied_tier,
        })
    }

    /// Estimate shipping for the selected lines without evaluating promotions.
    ///
    /// # Errors
    ///
    /// Returns an error when line totals or the region cannot be priced.
    pub fn estimate_shipping<'a>(
        &self,
        items: &[LineItem<'a>],
        currency: &'a Currency,
        region: &str,
    ) -> Result<Money<'a, Currency>, CalculationError> {
        let selected_amount = total_price(items, currency, LineItem::is_selected)?;

        self.shipping_fee(&selected_amount, currency, region)
    }

    fn shipping_fee<'a>(
        &self,
        selected_amount: &Money<'_, Currency>,
        currency: &'a Currency,
        region: &str,
    ) -> Result<Money<'a, Currency>, CalculationError> {
        let fee = self.shipping.lookup(region, selected_amount)?;

        Ok(Money::from_minor(fee.to_minor_units(), currency))
    }
}

//! Coupons

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};

use crate::{
    discounts::{Discount, DiscountError},
    promotions::PromotionError,
};

/// A coupon a shopper can redeem against their selected lines.
#[derive(Debug, Clone)]
pub struct Coupon<'a> {
    id: String,
    minimum_spend: Money<'a, Currency>,
    discount: Discount<'a>,
}

impl<'a> Coupon<'a> {
    /// Create a new coupon.
    pub fn new(
        id: impl Into<String>,
        minimum_spend: Money<'a, Currency>,
        discount: Discount<'a>,
    ) -> Self {
        Self {
            id: id.into(),
            minimum_spend,
            discount,
        }
    }

    /// Return the coupon identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Return the minimum selected amount required to redeem the coupon.
    pub fn minimum_spend(&self) -> &Money<'a, Currency> {
        &self.minimum_spend
    }

    /// Return the coupon discount.
    pub fn discount(&self) -> &Discount<'a> {
        &self.discount
    }

    /// Check that `amount` is enough to redeem the coupon.
    ///
    /// # Errors
    ///
    /// - [`PromotionError::CouponIneligible`]: `amount` is below the minimum spend.
    /// - [`PromotionError::Discount`]: `amount` is in another currency.
    pub fn check_eligible(&self, amount: &Money<'_, Currency>) -> Result<(), PromotionError> {
        if amount.currency() != self.minimum_spend.currency() {
            return Err(DiscountError::CurrencyMismatch(
                self.minimum_spend.currency().iso_alpha_code,
                amount.currency().iso_alpha_code,
            )
            .into());
        }

        if amount.to_minor_units() < self.minimum_spend.to_minor_units() {
            return Err(PromotionError::CouponIneligible {
                coupon: self.id.clone(),
                minimum_spend: self.minimum_spend.to_minor_units(),
            });
        }

        Ok(())
    }

    /// Calculate the coupon discount on `amount` in unrounded minor units.
    ///
    /// # Errors
    ///
    /// Returns an error when the coupon is not eligible or the discount cannot be computed.
    pub fn discount_on(&self, amount: &Money<'_, Currency>) -> Result<Decimal, PromotionError> {
        self.check_eligible(amount)?;

        Ok(self.discount.amount_on(amount)?)
    }
}

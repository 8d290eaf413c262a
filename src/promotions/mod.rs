//! Promotions
//!
//! Promotions are evaluated against the amount of the selected cart lines only. Spend tiers
//! apply automatically; a coupon applies only when explicitly requested and eligible.

use rust_decimal::{Decimal, prelude::FromPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::discounts::DiscountError;

pub mod coupons;
pub mod tiers;

pub use coupons::Coupon;
pub use tiers::{SpendTier, best_tier};

/// Errors raised while evaluating promotions.
#[derive(Debug, Error, PartialEq)]
pub enum PromotionError {
    /// The coupon exists but the selected amount is below its minimum spend.
    #[error("coupon {coupon} requires a minimum spend of {minimum_spend} minor units")]
    CouponIneligible {
        /// Coupon identifier
        coupon: String,

        /// Minimum spend in minor units
        minimum_spend: i64,
    },

    /// No coupon with this identifier is configured.
    #[error("unknown coupon {0}")]
    UnknownCoupon(String),

    /// Wrapped discount arithmetic error.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// The outcome of evaluating promotions against a selected amount.
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionOutcome {
    /// Total discount in unrounded minor units. Never exceeds the evaluated amount.
    pub discount: Decimal,

    /// Identifier of the coupon that was applied, if any.
    pub applied_coupon: Option<String>,

    /// Index of the spend tier that was applied, if any.
    pub applied_tier: Option<usize>,
}

impl PromotionOutcome {
    /// An outcome with no discount applied.
    pub fn none() -> Self {
        Self {
            discount: Decimal::ZERO,
            applied_coupon: None,
            applied_tier: None,
        }
    }
}

/// Source of promotion decisions for the calculation engine.
pub trait PromotionService: Send + Sync {
    /// Evaluate spend tiers and the optional coupon against the selected amount.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError::CouponIneligible`] or [`PromotionError::UnknownCoupon`]
    /// when the requested coupon cannot be applied; an ineligible coupon is never silently
    /// ignored.
    fn evaluate(
        &self,
        selected_amount: &Money<'_, Currency>,
        coupon: Option<&str>,
    ) -> Result<PromotionOutcome, PromotionError>;
}

/// Static promotion rules: spend tiers plus a coupon table.
#[derive(Debug, Clone, Default)]
pub struct PromotionRules<'a> {
    tiers: Vec<SpendTier<'a>>,
    coupons: FxHashMap<String, Coupon<'a>>,
}

impl<'a> PromotionRules<'a> {
    /// Create rules from tiers and coupons.
    pub fn new(tiers: Vec<SpendTier<'a>>, coupons: impl IntoIterator<Item = Coupon<'a>>) -> Self {
        Self {
            tiers,
            coupons: coupons
                .into_iter()
                .map(|coupon| (coupon.id().to_string(), coupon))
                .collect(),
        }
    }

    /// Return the configured spend tiers.
    pub fn tiers(&self) -> &[SpendTier<'a>] {
        &self.tiers
    }

    /// Look up a coupon by identifier.
    pub fn coupon(&self, id: &str) -> Option<&Coupon<'a>> {
        self.coupons.get(id)
    }
}

impl PromotionService for PromotionRules<'_> {
    fn evaluate(
        &self,
        selected_amount: &Money<'_, Currency>,
        coupon: Option<&str>,
    ) -> Result<PromotionOutcome, PromotionError> {
        let mut outcome = PromotionOutcome::none();

        if let Some((index, tier)) = best_tier(&self.tiers, selected_amount) {
            outcome.discount = tier.discount().amount_on(selected_amount)?;
            outcome.applied_tier = Some(index);
        }

        if let Some(id) = coupon {
            let coupon = self
                .coupon(id)
                .ok_or_else(|| PromotionError::UnknownCoupon(id.to_string()))?;

            let off = coupon.discount_on(selected_amount)?;

            outcome.discount = outcome
                .discount
                .checked_add(off)
                .ok_or(DiscountError::PercentConversion)?;
            outcome.applied_coupon = Some(coupon.id().to_string());
        }

        let ceiling = Decimal::from_i64(selected_amount.to_minor_units())
            .ok_or(DiscountError::PercentConversion)?;

        outcome.discount = outcome.discount.min(ceiling);

        Ok(outcome)
    }
}

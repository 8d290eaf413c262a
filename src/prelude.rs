//! Trolley prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    calculation::{CalculationError, CartCalculation, Calculator},
    discounts::{Discount, DiscountError},
    items::LineItem,
    pricing::{TotalPriceError, round_minor, total_price},
    promotions::{
        Coupon, PromotionError, PromotionOutcome, PromotionRules, PromotionService, SpendTier,
    },
    rules::{PricingRules, RulesError},
    shipping::{RegionRate, RegionRates, ShippingError, ShippingRateTable},
};

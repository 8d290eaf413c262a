//! Shipping

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

/// Errors raised while looking up shipping rates.
#[derive(Debug, Error, PartialEq)]
pub enum ShippingError {
    /// The region has no rate and the table has no default rate.
    #[error("no shipping rate for region {0}")]
    UnknownRegion(String),

    /// The region's rate is in another currency than the cart (rate currency, cart currency).
    #[error("shipping rate is in {0}, but the cart is in {1}")]
    CurrencyMismatch(&'static str, &'static str),
}

/// Source of shipping fees for the calculation engine.
pub trait ShippingRateTable: Send + Sync {
    /// Return the shipping fee for `region` given the selected amount.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::UnknownRegion`] when the region cannot be priced.
    fn lookup(
        &self,
        region: &str,
        selected_amount: &Money<'_, Currency>,
    ) -> Result<Money<'static, Currency>, ShippingError>;
}

/// The shipping rate of a single region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRate {
    /// Flat fee charged below the free-shipping threshold.
    pub flat_fee: Money<'static, Currency>,

    /// Selected amount at or above which shipping is free, if any.
    pub free_shipping_threshold: Option<Money<'static, Currency>>,
}

impl RegionRate {
    /// Create a rate with a flat fee and no free-shipping threshold.
    pub fn flat(flat_fee: Money<'static, Currency>) -> Self {
        Self {
            flat_fee,
            free_shipping_threshold: None,
        }
    }

    /// Set the free-shipping threshold.
    #[must_use]
    pub fn free_from(mut self, threshold: Money<'static, Currency>) -> Self {
        self.free_shipping_threshold = Some(threshold);
        self
    }

    /// Fee for `selected_amount`: zero at or above the threshold, the flat fee otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::CurrencyMismatch`] if the amount is in another currency.
    pub fn fee_for(
        &self,
        selected_amount: &Money<'_, Currency>,
    ) -> Result<Money<'static, Currency>, ShippingError> {
        let currency = self.flat_fee.currency();

        if selected_amount.currency() != currency {
            return Err(ShippingError::CurrencyMismatch(
                currency.iso_alpha_code,
                selected_amount.currency().iso_alpha_code,
            ));
        }

        let free = self
            .free_shipping_threshold
            .is_some_and(|threshold| {
                selected_amount.to_minor_units() >= threshold.to_minor_units()
            });

        if free {
            Ok(Money::from_minor(0, currency))
        } else {
            Ok(self.flat_fee)
        }
    }
}

/// Region-keyed shipping rate table with an optional fallback rate.
#[derive(Debug, Clone, Default)]
pub struct RegionRates {
    regions: FxHashMap<String, RegionRate>,
    default: Option<RegionRate>,
}

impl RegionRates {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the rate for a region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>, rate: RegionRate) -> Self {
        self.regions.insert(region.into(), rate);
        self
    }

    /// Set the rate used for regions without their own entry.
    #[must_use]
    pub fn with_default(mut self, rate: RegionRate) -> Self {
        self.default = Some(rate);
        self
    }

    /// Return the rate applying to `region`.
    pub fn rate(&self, region: &str) -> Option<&RegionRate> {
        self.regions.get(region).or(self.default.as_ref())
    }
}

impl ShippingRateTable for RegionRates {
    fn lookup(
        &self,
        region: &str,
        selected_amount: &Money<'_, Currency>,
    ) -> Result<Money<'static, Currency>, ShippingError> {
        self.rate(region)
            .ok_or_else(|| ShippingError::UnknownRegion(region.to_string()))?
            .fee_for(selected_amount)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use super::*;

    fn table() -> RegionRates {
        RegionRates::new()
            .with_region(
                "domestic",
                RegionRate::flat(Money::from_minor(10_00, GBP))
                    .free_from(Money::from_minor(100_00, GBP)),
            )
            .with_region("overseas", RegionRate::flat(Money::from_minor(25_00, GBP)))
    }

    #[test]
    fn flat_fee_below_threshold() -> TestResult {
        let fee = table().lookup("domestic", &Money::from_minor(99_99, GBP))?;

        assert_eq!(fee, Money::from_minor(10_00, GBP));

        Ok(())
    }

    #[test]
    fn free_at_threshold() -> TestResult {
        let fee = table().lookup("domestic", &Money::from_minor(100_00, GBP))?;

        assert_eq!(fee, Money::from_minor(0, GBP));

        Ok(())
    }

    #[test]
    fn region_without_threshold_always_charges() -> TestResult {
        let fee = table().lookup("overseas", &Money::from_minor(1_000_00, GBP))?;

        assert_eq!(fee, Money::from_minor(25_00, GBP));

        Ok(())
    }

    #[test]
    fn unknown_region_without_default_is_an_error() {
        let result = table().lookup("moon", &Money::from_minor(10_00, GBP));

        assert_eq!(result, Err(ShippingError::UnknownRegion("moon".to_string())));
    }

    #[test]
    fn unknown_region_uses_default() -> TestResult {
        let table = table().with_default(RegionRate::flat(Money::from_minor(40_00, GBP)));

        let fee = table.lookup("moon", &Money::from_minor(10_00, GBP))?;

        assert_eq!(fee, Money::from_minor(40_00, GBP));

        Ok(())
    }

    #[test]
    fn currency_mismatch_is_an_error() {
        let result = table().lookup("domestic", &Money::from_minor(10_00, USD));

        assert_eq!(
            result,
            Err(ShippingError::CurrencyMismatch(
                GBP.iso_alpha_code,
                USD.iso_alpha_code
            ))
        );
    }
}

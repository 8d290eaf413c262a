//! Pricing Rules
//!
//! Promotion tiers, coupons and shipping rates are loaded from YAML:
//!
//! ```yaml
//! currency: GBP
//! tiers:
//!   - threshold: "200.00 GBP"
//!     discount: { type: amount_off, value: "15.00 GBP" }
//! coupons:
//!   C1:
//!     minimum_spend: "80.00 GBP"
//!     discount: { type: percentage, value: "10%", cap: "50.00 GBP" }
//! shipping:
//!   default: { flat_fee: "15.00 GBP" }
//!   regions:
//!     domestic: { flat_fee: "10.00 GBP", free_shipping_threshold: "100.00 GBP" }
//! ```

use std::{fs, path::Path};

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{Findable, Money, iso::Currency};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    discounts::Discount,
    promotions::{Coupon, PromotionRules, SpendTier},
    shipping::{RegionRate, RegionRates},
};

/// Pricing rules parsing errors
#[derive(Debug, Error)]
pub enum RulesError {
    /// IO error reading the rules file
    #[error("failed to read pricing rules: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Unknown currency code
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// A price is not in the rules currency (expected, found)
    #[error("currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    currency: String,

    #[serde(default)]
    tiers: Vec<TierEntry>,

    #[serde(default)]
    coupons: FxHashMap<String, CouponEntry>,

    #[serde(default)]
    shipping: ShippingEntry,
}

#[derive(Debug, Deserialize)]
struct TierEntry {
    threshold: String,
    discount: DiscountEntry,
}

#[derive(Debug, Deserialize)]
struct CouponEntry {
    minimum_spend: String,
    discount: DiscountEntry,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DiscountEntry {
    /// "10%" or "0.10", with an optional cap such as "50.00 GBP"
    Percentage { value: String, cap: Option<String> },

    /// Fixed amount off, e.g. "5.00 GBP"
    AmountOff { value: String },
}

#[derive(Debug, Default, Deserialize)]
struct ShippingEntry {
    default: Option<RateEntry>,

    #[serde(default)]
    regions: FxHashMap<String, RateEntry>,
}

#[derive(Debug, Deserialize)]
struct RateEntry {
    flat_fee: String,
    free_shipping_threshold: Option<String>,
}

/// Promotion and shipping rules for a single currency.
#[derive(Debug, Clone)]
pub struct PricingRules {
    currency: &'static Currency,
    promotions: PromotionRules<'static>,
    shipping: RegionRates,
}

impl PricingRules {
    /// Build rules from already constructed parts.
    pub fn new(
        currency: &'static Currency,
        promotions: PromotionRules<'static>,
        shipping: RegionRates,
    ) -> Self {
        Self {
            currency,
            promotions,
            shipping,
        }
    }

    /// Load rules from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        Self::from_yaml_str(&fs::read_to_string(path)?)
    }

    /// Parse rules from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed, a price or percentage cannot be parsed, or a
    /// price is in another currency than the rules currency.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RulesError> {
        let file: RulesFile = serde_norway::from_str(yaml)?;

        let currency = Currency::find(&file.currency)
            .ok_or_else(|| RulesError::UnknownCurrency(file.currency.clone()))?;

        let tiers = file
            .tiers
            .iter()
            .map(|tier| {
                Ok(SpendTier::new(
                    rules_money(&tier.threshold, currency)?,
                    rules_discount(&tier.discount, currency)?,
                ))
            })
            .collect::<Result<Vec<_>, RulesError>>()?;

        let coupons = file
            .coupons
            .iter()
            .map(|(id, coupon)| {
                Ok(Coupon::new(
                    id.clone(),
                    rules_money(&coupon.minimum_spend, currency)?,
                    rules_discount(&coupon.discount, currency)?,
                ))
            })
            .collect::<Result<Vec<_>, RulesError>>()?;

        let mut shipping = RegionRates::new();

        for (region, entry) in &file.shipping.regions {
            shipping = shipping.with_region(region.clone(), rules_rate(entry, currency)?);
        }

        if let Some(entry) = &file.shipping.default {
            shipping = shipping.with_default(rules_rate(entry, currency)?);
        }

        Ok(Self {
            currency,
            promotions: PromotionRules::new(tiers, coupons),
            shipping,
        })
    }

    /// Return the currency all rules are expressed in.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Return the promotion rules.
    pub fn promotions(&self) -> &PromotionRules<'static> {
        &self.promotions
    }

    /// Return the shipping rate table.
    pub fn shipping(&self) -> &RegionRates {
        &self.shipping
    }
}

fn rules_money(
    value: &str,
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, RulesError> {
    let (minor_units, price_currency) = parse_price(value)?;

    if price_currency != currency {
        return Err(RulesError::CurrencyMismatch(
            currency.iso_alpha_code.to_string(),
            price_currency.iso_alpha_code.to_string(),
        ));
    }

    Ok(Money::from_minor(minor_units, currency))
}

fn rules_discount(
    entry: &DiscountEntry,
    currency: &'static Currency,
) -> Result<Discount<'static>, RulesError> {
    match entry {
        DiscountEntry::Percentage { value, cap } => Ok(Discount::PercentageOff {
            percent: parse_percentage(value)?,
            cap: cap
                .as_deref()
                .map(|cap| rules_money(cap, currency))
                .transpose()?,
        }),
        DiscountEntry::AmountOff { value } => {
            Ok(Discount::AmountOff(rules_money(value, currency)?))
        }
    }
}

fn rules_rate(entry: &RateEntry, currency: &'static Currency) -> Result<RegionRate, RulesError> {
    Ok(RegionRate {
        flat_fee: rules_money(&entry.flat_fee, currency)?,
        free_shipping_threshold: entry
            .free_shipping_threshold
            .as_deref()
            .map(|threshold| rules_money(threshold, currency))
            .transpose()?,
    })
}

/// Parse price string (e.g., "2.99 GBP") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY", if the amount
/// cannot be parsed as a decimal, or if the currency code is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), RulesError> {
    let parts: Vec<&str> = s.split_whitespace().collect();

    let [amount, currency_code] = parts.as_slice() else {
        return Err(RulesError::InvalidPrice(format!(
            "expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let currency = Currency::find(currency_code)
        .ok_or_else(|| RulesError::UnknownCurrency((*currency_code).to_string()))?;

    let minor_units = amount
        .parse::<Decimal>()
        .map_err(|_err| RulesError::InvalidPrice(s.to_string()))?
        .checked_mul(Decimal::from(10_i64.pow(currency.exponent)))
        .and_then(|value| value.round_dp(0).to_i64())
        .filter(|value| *value >= 0)
        .ok_or_else(|| RulesError::InvalidPrice(s.to_string()))?;

    Ok((minor_units, currency))
}

/// Parse percentage string (e.g., "15%" or "0.15") into a `Percentage`
///
/// # Errors
///
/// Returns an error if the string cannot be parsed or is negative.
pub fn parse_percentage(s: &str) -> Result<Percentage, RulesError> {
    let trimmed = s.trim();

    let value = if let Some(percent_str) = trimmed.strip_suffix('%') {
        percent_str
            .trim()
            .parse::<f64>()
            .map_err(|_err| RulesError::InvalidPercentage(s.to_string()))?
            / 100.0
    } else {
        trimmed
            .parse::<f64>()
            .map_err(|_err| RulesError::InvalidPercentage(s.to_string()))?
    };

    if !value.is_finite() || value < 0.0 {
        return Err(RulesError::InvalidPercentage(s.to_string()));
    }

    Ok(Percentage::from(value))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rusty_money::iso::{EUR, GBP, USD};
    use testresult::TestResult;

    use crate::{promotions::PromotionService, shipping::ShippingRateTable};

    use super::*;

    const RULES: &str = r#"
currency: GBP
tiers:
  - threshold: "200.00 GBP"
    discount: { type: amount_off, value: "15.00 GBP" }
coupons:
  C1:
    minimum_spend: "80.00 GBP"
    discount: { type: percentage, value: "10%", cap: "50.00 GBP" }
  C2:
    minimum_spend: "150.00 GBP"
    discount: { type: percentage, value: "0.10" }
shipping:
  default: { flat_fee: "15.00 GBP" }
  regions:
    domestic: { flat_fee: "10.00 GBP", free_shipping_threshold: "100.00 GBP" }
"#;

    #[test]
    fn parse_price_rejects_invalid_format() {
        let result = parse_price("2.99GBP");

        assert!(matches!(result, Err(RulesError::InvalidPrice(_))));
    }

    #[test]
    fn parse_price_rejects_unknown_currency() {
        let result = parse_price("2.99 ABC");

        assert!(matches!(result, Err(RulesError::UnknownCurrency(code)) if code == "ABC"));
    }

    #[test]
    fn parse_price_rejects_negative_amounts() {
        let result = parse_price("-2.99 GBP");

        assert!(matches!(result, Err(RulesError::InvalidPrice(_))));
    }

    #[test]
    fn parse_price_accepts_usd_and_eur() -> TestResult {
        let (usd_minor, usd) = parse_price("1.00 USD")?;
        let (eur_minor, eur) = parse_price("2.50 EUR")?;

        assert_eq!(usd_minor, 100);
        assert_eq!(usd, USD);
        assert_eq!(eur_minor, 250);
        assert_eq!(eur, EUR);

        Ok(())
    }

    #[test]
    fn parse_percentage_accepts_both_formats() -> TestResult {
        assert_eq!(parse_percentage("15%")?, Percentage::from(0.15));
        assert_eq!(parse_percentage("0.15")?, Percentage::from(0.15));

        Ok(())
    }

    #[test]
    fn parse_percentage_rejects_garbage() {
        assert!(matches!(
            parse_percentage("lots"),
            Err(RulesError::InvalidPercentage(_))
        ));
        assert!(matches!(
            parse_percentage("-5%"),
            Err(RulesError::InvalidPercentage(_))
        ));
    }

    #[test]
    fn rules_parse_from_yaml() -> TestResult {
        let rules = PricingRules::from_yaml_str(RULES)?;

        assert_eq!(rules.currency(), GBP);
        assert_eq!(rules.promotions().tiers().len(), 1);
        assert!(rules.promotions().coupon("C1").is_some());

        let fee = rules
            .shipping()
            .lookup("domestic", &Money::from_minor(100_00, GBP))?;

        assert_eq!(fee, Money::from_minor(0, GBP));

        let fallback = rules
            .shipping()
            .lookup("elsewhere", &Money::from_minor(100_00, GBP))?;

        assert_eq!(fallback, Money::from_minor(15_00, GBP));

        let outcome = rules
            .promotions()
            .evaluate(&Money::from_minor(100_00, GBP), Some("C1"))?;

        assert_eq!(outcome.discount.round_dp(2), Decimal::from(10_00));

        Ok(())
    }

    #[test]
    fn rules_reject_prices_in_other_currency() {
        let yaml = r#"
currency: GBP
shipping:
  regions:
    domestic: { flat_fee: "10.00 USD" }
"#;

        let result = PricingRules::from_yaml_str(yaml);

        assert!(matches!(
            result,
            Err(RulesError::CurrencyMismatch(expected, found)) if expected == "GBP" && found == "USD"
        ));
    }

    #[test]
    fn rules_reject_unknown_discount_type() {
        let yaml = r#"
currency: GBP
tiers:
  - threshold: "10.00 GBP"
    discount: { type: buy_one_get_one, value: "1" }
"#;

        assert!(matches!(
            PricingRules::from_yaml_str(yaml),
            Err(RulesError::Yaml(_))
        ));
    }

    #[test]
    fn rules_load_from_file() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(RULES.as_bytes())?;

        let rules = PricingRules::from_path(file.path())?;

        assert!(rules.promotions().coupon("C2").is_some());

        Ok(())
    }
}

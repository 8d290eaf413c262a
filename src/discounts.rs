//! Discounts
//!
//! Discount amounts are returned as unrounded minor-unit decimals so that several discounts
//! can be combined before any rounding happens.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

/// Errors specific to discount calculations.
#[derive(Debug, Error, PartialEq)]
pub enum DiscountError {
    /// Percentage calculation could not be safely represented.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// The discount is configured in another currency than the amount it applies to.
    #[error("discount is in {0}, but the amount is in {1}")]
    CurrencyMismatch(&'static str, &'static str),
}

/// A discount that can be taken off an amount.
#[derive(Debug, Copy, Clone)]
pub enum Discount<'a> {
    /// Percentage off the amount (e.g. "10% off"), optionally capped at a maximum.
    PercentageOff {
        /// Fraction of the amount to take off.
        percent: Percentage,

        /// Upper bound for the discount, if any.
        cap: Option<Money<'a, Currency>>,
    },

    /// Fixed amount off (e.g. "£5 off").
    AmountOff(Money<'a, Currency>),
}

impl Discount<'_> {
    /// Calculate the discount on `amount`, in unrounded minor units.
    ///
    /// The result is never negative and never exceeds `amount`.
    ///
    /// # Errors
    ///
    /// - [`DiscountError::PercentConversion`]: the percentage multiplication overflowed.
    /// - [`DiscountError::CurrencyMismatch`]: a fixed amount or cap is in another currency.
    pub fn amount_on(&self, amount: &Money<'_, Currency>) -> Result<Decimal, DiscountError> {
        let base = minor_decimal(amount)?;

        let discount = match self {
            Discount::PercentageOff { percent, cap } => {
                let off = percent_of(percent, base)?;

                match cap {
                    Some(cap) => off.min(minor_decimal(ensure_currency(cap, amount)?)?),
                    None => off,
                }
            }
            Discount::AmountOff(off) => minor_decimal(ensure_currency(off, amount)?)?,
        };

        Ok(discount.max(Decimal::ZERO).min(base))
    }
}

/// Calculate `percent` of a minor-unit decimal amount without rounding.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] when the multiplication overflows.
pub fn percent_of(percent: &Percentage, minor: Decimal) -> Result<Decimal, DiscountError> {
    ((*percent) * Decimal::ONE) // decimal_percentage doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)
}

fn minor_decimal(money: &Money<'_, Currency>) -> Result<Decimal, DiscountError> {
    Decimal::from_i64(money.to_minor_units()).ok_or(DiscountError::PercentConversion)
}

fn ensure_currency<'m>(
    money: &'m Money<'_, Currency>,
    amount: &Money<'_, Currency>,
) -> Result<&'m Money<'m, Currency>, DiscountError> {
    if money.currency() == amount.currency() {
        Ok(money)
    } else {
        Err(DiscountError::CurrencyMismatch(
            money.currency().iso_alpha_code,
            amount.currency().iso_alpha_code,
        ))
    }
}

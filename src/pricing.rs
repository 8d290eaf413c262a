//! Pricing

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::items::LineItem;

/// Errors that can occur while calculating total price.
#[derive(Debug, Error, PartialEq)]
pub enum TotalPriceError {
    /// A line's currency differs from the cart currency (line index, line currency, cart currency).
    #[error("line {0} has currency {1}, but cart has currency {2}")]
    CurrencyMismatch(usize, &'static str, &'static str),

    /// A line total or the running sum left the representable range.
    #[error("price arithmetic overflowed")]
    Overflow,
}

/// Calculates the price of a single line (unit price times quantity) in minor units.
///
/// # Errors
///
/// Returns [`TotalPriceError::Overflow`] when the multiplication overflows.
pub fn line_total(item: &LineItem<'_>) -> Result<i64, TotalPriceError> {
    item.unit_price()
        .to_minor_units()
        .checked_mul(i64::from(item.quantity()))
        .ok_or(TotalPriceError::Overflow)
}

/// Calculates the total price of every line matching `include`.
///
/// An empty selection totals to zero in the given currency.
///
/// # Errors
///
/// - [`TotalPriceError::CurrencyMismatch`]: a line is priced in another currency.
/// - [`TotalPriceError::Overflow`]: the total cannot be represented.
pub fn total_price<'a>(
    items: &[LineItem<'a>],
    currency: &'a Currency,
    include: impl Fn(&LineItem<'a>) -> bool,
) -> Result<Money<'a, Currency>, TotalPriceError> {
    let total = items
        .iter()
        .enumerate()
        .filter(|&(_, item)| include(item))
        .try_fold(0_i64, |acc, (i, item)| {
            let item_currency = item.unit_price().currency();

            if item_currency != currency {
                return Err(TotalPriceError::CurrencyMismatch(
                    i,
                    item_currency.iso_alpha_code,
                    currency.iso_alpha_code,
                ));
            }

            acc.checked_add(line_total(item)?)
                .ok_or(TotalPriceError::Overflow)
        })?;

    Ok(Money::from_minor(total, currency))
}

/// Round a minor-unit decimal amount to a whole minor unit, half-up.
///
/// Amounts reaching this function are never negative, so rounding midpoints away from zero
/// is rounding half-up.
///
/// # Errors
///
/// Returns [`TotalPriceError::Overflow`] when the rounded value does not fit an `i64`.
pub fn round_minor(amount: Decimal) -> Result<i64, TotalPriceError> {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(TotalPriceError::Overflow)
}

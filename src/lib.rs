//! Trolley
//!
//! Trolley is the pricing core of a shopping cart: it turns a snapshot of cart lines, a
//! shipping region and an optional coupon into reproducible monetary totals.
//!
//! Everything in this crate is synchronous and side-effect free. Amounts are carried as
//! fixed-point decimals and only rounded at the payable and shipping boundaries.

pub mod calculation;
pub mod discounts;
pub mod items;
pub mod prelude;
pub mod pricing;
pub mod promotions;
pub mod rules;
pub mod shipping;

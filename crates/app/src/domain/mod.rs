//! Trolley Domain Concerns

pub mod cache;
pub mod carts;
pub mod pricing;
pub mod products;
pub mod recommendations;
pub mod sync;

//! Products
//!
//! The product catalog is an external collaborator: carts only read live price, stock and
//! catalog metadata from it.

pub mod errors;
pub mod models;
mod oracle;
mod repository;

pub use errors::ProductOracleError;
pub use oracle::*;
pub use repository::PgProductCatalog;
pub(crate) use repository::try_get_unsigned;

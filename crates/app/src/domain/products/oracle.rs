//! Product Oracle

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;

use crate::{
    deadline::bounded,
    domain::products::{
        errors::ProductOracleError,
        models::{CatalogProduct, PriceAndStock, ProductUuid},
    },
};

#[automock]
#[async_trait]
/// Source of live product price and stock.
pub trait ProductOracle: Send + Sync {
    /// Return the live price and stock, or `None` when the product no longer exists.
    async fn price_and_stock(
        &self,
        product: ProductUuid,
    ) -> Result<Option<PriceAndStock>, ProductOracleError>;
}

#[automock]
#[async_trait]
/// Source of catalog metadata for recommendations.
pub trait CatalogSource: Send + Sync {
    /// Return up to `limit` candidate products, most popular first.
    async fn candidates(&self, limit: usize) -> Result<Vec<CatalogProduct>, ProductOracleError>;

    /// Return catalog metadata for the given products, skipping any that no longer exist.
    async fn products(
        &self,
        products: &[ProductUuid],
    ) -> Result<Vec<CatalogProduct>, ProductOracleError>;
}

/// Ask the oracle for a product, giving up after `limit`.
///
/// # Errors
///
/// Returns [`ProductOracleError::Timeout`] when the oracle does not answer in time, or the
/// oracle's own error.
pub async fn price_and_stock_within(
    oracle: &dyn ProductOracle,
    product: ProductUuid,
    limit: Duration,
) -> Result<Option<PriceAndStock>, ProductOracleError> {
    bounded(
        limit,
        ProductOracleError::Timeout,
        oracle.price_and_stock(product),
    )
    .await
}

//! Products Repository

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Row, postgres::PgRow, query_as};
use uuid::Uuid;

use crate::domain::products::{
    errors::ProductOracleError,
    models::{CatalogProduct, PriceAndStock, ProductUuid},
    oracle::{CatalogSource, ProductOracle},
};

const GET_PRICE_AND_STOCK_SQL: &str = include_str!("sql/get_price_and_stock.sql");
const GET_CATALOG_PRODUCTS_SQL: &str = include_str!("sql/get_catalog_products.sql");
const LIST_CATALOG_PRODUCTS_SQL: &str = include_str!("sql/list_catalog_products.sql");

/// Read-only view over the `products` table.
#[derive(Debug, Clone)]
pub struct PgProductCatalog {
    pool: PgPool,
}

impl PgProductCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductOracle for PgProductCatalog {
    async fn price_and_stock(
        &self,
        product: ProductUuid,
    ) -> Result<Option<PriceAndStock>, ProductOracleError> {
        let found = query_as::<Postgres, PriceAndStock>(GET_PRICE_AND_STOCK_SQL)
            .bind(product.into_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(found)
    }
}

#[async_trait]
impl CatalogSource for PgProductCatalog {
    async fn candidates(&self, limit: usize) -> Result<Vec<CatalogProduct>, ProductOracleError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let products = query_as::<Postgres, CatalogProduct>(LIST_CATALOG_PRODUCTS_SQL)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn products(
        &self,
        products: &[ProductUuid],
    ) -> Result<Vec<CatalogProduct>, ProductOracleError> {
        let uuids: Vec<Uuid> = products.iter().map(|product| product.into_uuid()).collect();

        let products = query_as::<Postgres, CatalogProduct>(GET_CATALOG_PRODUCTS_SQL)
            .bind(uuids)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }
}

impl<'r> FromRow<'r, PgRow> for PriceAndStock {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            price: try_get_unsigned(row, "price")?,
            stock: try_get_unsigned(row, "stock")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for CatalogProduct {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: ProductUuid::from_uuid(row.try_get("uuid")?),
            category: row.try_get("category")?,
            popularity: try_get_unsigned(row, "popularity")?,
        })
    }
}

/// Decode a signed integer column into an unsigned field, rejecting negatives.
pub(crate) fn try_get_unsigned<T>(row: &PgRow, col: &str) -> Result<T, sqlx::Error>
where
    T: TryFrom<i64, Error = std::num::TryFromIntError>,
{
    let value: i64 = row.try_get(col)?;

    T::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

//! Product Models

use serde::Serialize;

use crate::uuids::TypedUuid;

/// Product UUID
pub type ProductUuid = TypedUuid<Product>;

/// Product Model
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub uuid: ProductUuid,

    /// Unit price in minor units.
    pub price: u64,
    pub stock: u32,
    pub category: String,

    /// Relative popularity, e.g. units sold.
    pub popularity: u64,
}

/// Live price and stock for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceAndStock {
    pub price: u64,
    pub stock: u32,
}

/// Catalog metadata used to score recommendations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogProduct {
    pub uuid: ProductUuid,
    pub category: String,
    pub popularity: u64,
}

impl From<&Product> for PriceAndStock {
    fn from(product: &Product) -> Self {
        Self {
            price: product.price,
            stock: product.stock,
        }
    }
}

impl From<&Product> for CatalogProduct {
    fn from(product: &Product) -> Self {
        Self {
            uuid: product.uuid,
            category: product.category.clone(),
            popularity: product.popularity,
        }
    }
}

//! Recommendations
//!
//! Best-effort scoring of catalog products against what is already in a cart. A product
//! scores for every cart line in its category, weighted by quantity, plus a share of its
//! popularity relative to the most popular candidate.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::warn;

use crate::domain::{
    carts::models::{Cart, ItemStatus},
    products::{
        CatalogSource, ProductOracleError,
        models::{CatalogProduct, ProductUuid},
    },
};

/// Number of recommendations returned when the caller does not ask for a limit.
pub const DEFAULT_LIMIT: usize = 5;

/// Weight of normalized popularity against category affinity.
const POPULARITY_WEIGHT: f64 = 0.25;

/// Candidates fetched per requested recommendation.
const CANDIDATES_PER_RESULT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub product: ProductUuid,
    pub category: String,
    pub score: f64,
}

/// Scores catalog candidates for a cart.
#[derive(Clone)]
pub struct RecommendationEngine {
    catalog: Arc<dyn CatalogSource>,
}

impl RecommendationEngine {
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self { catalog }
    }

    /// Recommend up to `limit` products not already in the cart.
    ///
    /// Catalog failures yield no recommendations.
    pub async fn recommend(&self, cart: &Cart, limit: usize) -> Vec<Recommendation> {
        if limit == 0 {
            return Vec::new();
        }

        match self.gather(cart, limit).await {
            Ok((in_cart, candidates)) => score(cart, &in_cart, &candidates, limit),
            Err(error) => {
                warn!(owner = %cart.owner, error = %error, "recommendations unavailable");

                Vec::new()
            }
        }
    }

    async fn gather(
        &self,
        cart: &Cart,
        limit: usize,
    ) -> Result<(Vec<CatalogProduct>, Vec<CatalogProduct>), ProductOracleError> {
        let products: Vec<ProductUuid> = cart.items.iter().map(|item| item.product_uuid).collect();

        let in_cart = if products.is_empty() {
            Vec::new()
        } else {
            self.catalog.products(&products).await?
        };

        let candidates = self
            .catalog
            .candidates(limit.saturating_mul(CANDIDATES_PER_RESULT))
            .await?;

        Ok((in_cart, candidates))
    }
}

/// Rank `candidates` for `cart`.
///
/// `in_cart` carries catalog metadata for the cart's own products; only their categories
/// are used.
pub fn score(
    cart: &Cart,
    in_cart: &[CatalogProduct],
    candidates: &[CatalogProduct],
    limit: usize,
) -> Vec<Recommendation> {
    let categories: FxHashMap<ProductUuid, &str> = in_cart
        .iter()
        .map(|product| (product.uuid, product.category.as_str()))
        .collect();

    let mut weights: FxHashMap<&str, u64> = FxHashMap::default();
    let mut total: u64 = 0;

    for item in cart.items.iter().filter(|item| item.status != ItemStatus::Removed) {
        total = total.saturating_add(u64::from(item.quantity));

        if let Some(category) = categories.get(&item.product_uuid) {
            let weight = weights.entry(*category).or_default();
            *weight = weight.saturating_add(u64::from(item.quantity));
        }
    }

    let max_popularity = candidates
        .iter()
        .map(|product| product.popularity)
        .max()
        .unwrap_or(0);

    let ratio = |part: u64, whole: u64| {
        if whole == 0 {
            0.0
        } else {
            part as f64 / whole as f64
        }
    };

    let mut ranked: Vec<Recommendation> = candidates
        .iter()
        .filter(|product| !cart.items.iter().any(|item| item.product_uuid == product.uuid))
        .map(|product| {
            let affinity = ratio(
                weights.get(product.category.as_str()).copied().unwrap_or(0),
                total,
            );
            let popularity = ratio(product.popularity, max_popularity);

            Recommendation {
                product: product.uuid,
                category: product.category.clone(),
                score: affinity + POPULARITY_WEIGHT * popularity,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.product.cmp(&b.product))
    });

    ranked.dedup_by(|a, b| a.product == b.product);
    ranked.truncate(limit);

    ranked
}

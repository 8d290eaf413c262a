//! Carts service.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use mockall::automock;
use rusty_money::{Money, iso::Currency};
use tracing::{Span, info, warn};
use trolley::calculation::CartCalculation;

use crate::domain::{
    cache::CartAccess,
    carts::{
        errors::{CartsServiceError, StoreError},
        models::{
            CartItem, CartItemUuid, CartView, ItemChange, ItemUpdate, ItemWrite, NewCartItem, Owner,
        },
    },
    pricing::CartPricing,
    products::{CatalogSource, ProductOracle, models::ProductUuid, price_and_stock_within},
    recommendations::{Recommendation, RecommendationEngine},
    sync::{SyncEngine, SyncResult, ValidatedCart},
};

/// Carts service composed from cart access, the product oracle, sync, pricing and
/// recommendations.
#[derive(Clone)]
pub struct DefaultCartsService {
    access: Arc<dyn CartAccess>,
    oracle: Arc<dyn ProductOracle>,
    oracle_timeout: Duration,
    sync: SyncEngine,
    pricing: CartPricing,
    recommendations: RecommendationEngine,
}

impl DefaultCartsService {
    pub fn new(
        access: Arc<dyn CartAccess>,
        oracle: Arc<dyn ProductOracle>,
        catalog: Arc<dyn CatalogSource>,
        pricing: CartPricing,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            sync: SyncEngine::new(Arc::clone(&access), Arc::clone(&oracle), oracle_timeout),
            recommendations: RecommendationEngine::new(catalog),
            access,
            oracle,
            oracle_timeout,
            pricing,
        }
    }

    /// Commit `writes` against the cart as it is in the store now.
    async fn write(&self, owner: &Owner, writes: &[ItemWrite]) -> Result<u64, StoreError> {
        let cart = self.access.load_for_write(owner).await?;

        self.access.commit(owner, cart.version, writes).await
    }
}

#[async_trait]
impl CartsService for DefaultCartsService {
    #[tracing::instrument(
        name = "carts.service.get_cart",
        skip_all,
        fields(owner = %owner, include_invalid = include_invalid),
        err
    )]
    async fn get_cart(
        &self,
        owner: &Owner,
        include_invalid: bool,
    ) -> Result<CartView, CartsServiceError> {
        let cart = self.access.get_cart(owner).await?;

        Ok(CartView::new(cart, include_invalid))
    }

    #[tracing::instrument(
        name = "carts.service.add_item",
        skip_all,
        fields(owner = %owner, product_uuid = %product, item_uuid = tracing::field::Empty),
        err
    )]
    async fn add_item(
        &self,
        owner: &Owner,
        product: ProductUuid,
        sku: Option<String>,
        quantity: i64,
    ) -> Result<CartItem, CartsServiceError> {
        let requested = u32::try_from(quantity)
            .ok()
            .filter(|quantity| *quantity > 0)
            .ok_or(CartsServiceError::InvalidQuantity(quantity))?;

        let live = price_and_stock_within(&*self.oracle, product, self.oracle_timeout)
            .await?
            .ok_or(CartsServiceError::ProductUnavailable)?;

        let cart = self.access.load_for_write(owner).await?;

        let existing = cart
            .line(product, sku.as_deref())
            .map_or(0, |line| line.quantity);

        if existing.saturating_add(requested) > live.stock {
            return Err(CartsServiceError::ProductUnavailable);
        }

        let item = self
            .access
            .add_item(
                owner,
                NewCartItem {
                    uuid: CartItemUuid::new(),
                    product_uuid: product,
                    sku,
                    quantity: requested,
                    price: live.price,
                },
            )
            .await?;

        Span::current().record("item_uuid", tracing::field::display(item.uuid));

        info!(owner = %owner, item = %item.uuid, quantity = item.quantity, "added cart item");

        Ok(item)
    }

    #[tracing::instrument(
        name = "carts.service.update_item",
        skip_all,
        fields(owner = %owner, item_uuid = %item),
        err
    )]
    async fn update_item(
        &self,
        owner: &Owner,
        item: CartItemUuid,
        update: ItemUpdate,
    ) -> Result<Option<CartItem>, CartsServiceError> {
        let writes = update
            .writes(item)
            .map_err(CartsServiceError::InvalidQuantity)?;

        let cart = self.access.load_for_write(owner).await?;

        if cart.item(item).is_none() {
            return Err(CartsServiceError::NotFound);
        }

        self.access.commit(owner, cart.version, &writes).await?;

        Ok(self.access.get_cart(owner).await?.item(item).cloned())
    }

    #[tracing::instrument(
        name = "carts.service.remove_item",
        skip_all,
        fields(owner = %owner, item_uuid = %item),
        err
    )]
    async fn remove_item(&self, owner: &Owner, item: CartItemUuid) -> Result<(), CartsServiceError> {
        self.write(owner, &[ItemWrite::Remove { item }]).await?;

        Ok(())
    }

    #[tracing::instrument(
        name = "carts.service.clear_cart",
        skip_all,
        fields(owner = %owner),
        err
    )]
    async fn clear_cart(&self, owner: &Owner) -> Result<(), CartsServiceError> {
        self.write(owner, &[ItemWrite::Clear]).await?;

        Ok(())
    }

    #[tracing::instrument(
        name = "carts.service.batch_update",
        skip_all,
        fields(owner = %owner, changes = changes.len()),
        err
    )]
    async fn batch_update(
        &self,
        owner: &Owner,
        changes: Vec<ItemChange>,
    ) -> Result<CartView, CartsServiceError> {
        let mut writes = Vec::with_capacity(changes.len());

        for change in &changes {
            writes.extend(
                change
                    .update
                    .writes(change.item)
                    .map_err(CartsServiceError::InvalidQuantity)?,
            );
        }

        if !writes.is_empty() {
            self.write(owner, &writes).await?;
        }

        let cart = self.access.get_cart(owner).await?;

        Ok(CartView::new(cart, true))
    }

    #[tracing::instrument(
        name = "carts.service.select_all",
        skip_all,
        fields(owner = %owner, selected = selected),
        err
    )]
    async fn select_all(&self, owner: &Owner, selected: bool) -> Result<(), CartsServiceError> {
        self.write(owner, &[ItemWrite::SelectAll { selected }])
            .await?;

        Ok(())
    }

    async fn item_count(&self, owner: &Owner) -> Result<u64, CartsServiceError> {
        Ok(self.access.item_count(owner).await?)
    }

    #[tracing::instrument(
        name = "carts.service.sync_cart_items",
        skip_all,
        fields(owner = %owner),
        err
    )]
    async fn sync_cart_items(&self, owner: &Owner) -> Result<SyncResult, CartsServiceError> {
        Ok(self.sync.sync_cart_items(owner).await?)
    }

    #[tracing::instrument(
        name = "carts.service.validate_cart_items",
        skip_all,
        fields(owner = %owner),
        err
    )]
    async fn validate_cart_items(&self, owner: &Owner) -> Result<ValidatedCart, CartsServiceError> {
        Ok(self.sync.validate_cart_items(owner).await?)
    }

    #[tracing::instrument(
        name = "carts.service.clean_invalid_items",
        skip_all,
        fields(owner = %owner),
        err
    )]
    async fn clean_invalid_items(&self, owner: &Owner) -> Result<usize, CartsServiceError> {
        Ok(self.sync.clean_invalid_items(owner).await?)
    }

    #[tracing::instrument(
        name = "carts.service.calculate",
        skip_all,
        fields(owner = %owner, region = %region, coupon = ?coupon),
        err
    )]
    async fn calculate(
        &self,
        owner: &Owner,
        region: &str,
        coupon: Option<String>,
    ) -> Result<CartCalculation<'static>, CartsServiceError> {
        let cart = self.access.get_cart(owner).await?;

        Ok(self.pricing.calculate(&cart, region, coupon.as_deref())?)
    }

    #[tracing::instrument(
        name = "carts.service.estimate_shipping",
        skip_all,
        fields(owner = %owner, region = %region),
        err
    )]
    async fn estimate_shipping(
        &self,
        owner: &Owner,
        region: &str,
    ) -> Result<Money<'static, Currency>, CartsServiceError> {
        let cart = self.access.get_cart(owner).await?;

        Ok(self.pricing.estimate_shipping(&cart, region)?)
    }

    async fn recommend(&self, owner: &Owner, limit: usize) -> Vec<Recommendation> {
        match self.access.get_cart(owner).await {
            Ok(cart) => self.recommendations.recommend(&cart, limit).await,
            Err(error) => {
                warn!(owner = %owner, error = %error, "cannot recommend without the cart");

                Vec::new()
            }
        }
    }
}

#[automock]
#[async_trait]
pub trait CartsService: Send + Sync {
    /// Retrieve the owner's cart. Out-of-stock and removed lines are hidden unless
    /// `include_invalid` is set.
    async fn get_cart(
        &self,
        owner: &Owner,
        include_invalid: bool,
    ) -> Result<CartView, CartsServiceError>;

    /// Add a product to the cart, merging with an existing line for the same product and SKU.
    async fn add_item(
        &self,
        owner: &Owner,
        product: ProductUuid,
        sku: Option<String>,
        quantity: i64,
    ) -> Result<CartItem, CartsServiceError>;

    /// Update a line. Returns `None` when the update removed it.
    async fn update_item(
        &self,
        owner: &Owner,
        item: CartItemUuid,
        update: ItemUpdate,
    ) -> Result<Option<CartItem>, CartsServiceError>;

    async fn remove_item(&self, owner: &Owner, item: CartItemUuid) -> Result<(), CartsServiceError>;

    async fn clear_cart(&self, owner: &Owner) -> Result<(), CartsServiceError>;

    /// Apply every change or none of them.
    async fn batch_update(
        &self,
        owner: &Owner,
        changes: Vec<ItemChange>,
    ) -> Result<CartView, CartsServiceError>;

    async fn select_all(&self, owner: &Owner, selected: bool) -> Result<(), CartsServiceError>;

    /// Sum of quantities over lines still in the catalog.
    async fn item_count(&self, owner: &Owner) -> Result<u64, CartsServiceError>;

    async fn sync_cart_items(&self, owner: &Owner) -> Result<SyncResult, CartsServiceError>;

    async fn validate_cart_items(&self, owner: &Owner) -> Result<ValidatedCart, CartsServiceError>;

    /// Delete out-of-stock and removed lines, returning how many were deleted.
    async fn clean_invalid_items(&self, owner: &Owner) -> Result<usize, CartsServiceError>;

    async fn calculate(
        &self,
        owner: &Owner,
        region: &str,
        coupon: Option<String>,
    ) -> Result<CartCalculation<'static>, CartsServiceError>;

    async fn estimate_shipping(
        &self,
        owner: &Owner,
        region: &str,
    ) -> Result<Money<'static, Currency>, CartsServiceError>;

    /// Best-effort recommendations; empty when anything goes wrong.
    async fn recommend(&self, owner: &Owner, limit: usize) -> Vec<Recommendation>;
}

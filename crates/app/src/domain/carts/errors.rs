//! Cart errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

use crate::domain::{
    carts::models::{CartItemUuid, MissingItem, UnknownItemStatus},
    products::errors::ProductOracleError,
};

/// Errors raised by cart stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cart not found")]
    CartNotFound,

    #[error("cart item {0} not found")]
    ItemNotFound(CartItemUuid),

    #[error("cart version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("store call timed out")]
    Timeout,

    #[error("invalid stored data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::CartNotFound;
        }

        if matches!(error, Error::ColumnDecode { .. }) {
            return Self::InvalidData;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::CheckViolation | ErrorKind::NotNullViolation) => Self::InvalidData,
            Some(ErrorKind::Other | _) | None => Self::Sql(error),
        }
    }
}

impl From<MissingItem> for StoreError {
    fn from(MissingItem(item): MissingItem) -> Self {
        Self::ItemNotFound(item)
    }
}

impl From<UnknownItemStatus> for StoreError {
    fn from(_: UnknownItemStatus) -> Self {
        Self::InvalidData
    }
}

/// Errors surfaced by the carts service.
#[derive(Debug, Error)]
pub enum CartsServiceError {
    #[error("cart or cart item not found")]
    NotFound,

    #[error("invalid quantity {0}")]
    InvalidQuantity(i64),

    #[error("product is unavailable")]
    ProductUnavailable,

    #[error("cart was modified concurrently, reload and retry")]
    ConcurrentModification,

    #[error("coupon {coupon} requires a minimum spend of {minimum_spend} minor units")]
    CouponIneligible { coupon: String, minimum_spend: i64 },

    #[error("unknown coupon {0}")]
    UnknownCoupon(String),

    #[error("no shipping rate for region {0}")]
    UnknownRegion(String),

    #[error("product lookup timed out")]
    OracleTimeout,

    #[error("cart store timed out")]
    StoreTimeout,

    #[error("storage error")]
    Storage(#[source] StoreError),

    #[error("product lookup failed")]
    Oracle(#[source] ProductOracleError),

    #[error("cart totals could not be calculated")]
    Calculation(#[source] trolley::calculation::CalculationError),
}

impl From<StoreError> for CartsServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::CartNotFound | StoreError::ItemNotFound(_) => Self::NotFound,
            StoreError::VersionConflict { .. } => Self::ConcurrentModification,
            StoreError::Timeout => Self::StoreTimeout,
            StoreError::InvalidData | StoreError::Sql(_) => Self::Storage(error),
        }
    }
}

impl From<ProductOracleError> for CartsServiceError {
    fn from(error: ProductOracleError) -> Self {
        match error {
            ProductOracleError::Timeout => Self::OracleTimeout,
            ProductOracleError::Sql(_) => Self::Oracle(error),
        }
    }
}

impl From<trolley::calculation::CalculationError> for CartsServiceError {
    fn from(error: trolley::calculation::CalculationError) -> Self {
        use trolley::{
            calculation::CalculationError, promotions::PromotionError, shipping::ShippingError,
        };

        match error {
            CalculationError::Promotion(PromotionError::CouponIneligible {
                coupon,
                minimum_spend,
            }) => Self::CouponIneligible {
                coupon,
                minimum_spend,
            },
            CalculationError::Promotion(PromotionError::UnknownCoupon(coupon)) => {
                Self::UnknownCoupon(coupon)
            }
            CalculationError::Shipping(ShippingError::UnknownRegion(region)) => {
                Self::UnknownRegion(region)
            }
            other => Self::Calculation(other),
        }
    }
}

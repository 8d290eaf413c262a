//! Carts Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as};
use uuid::Uuid;

use crate::domain::{carts::models::Owner, products::try_get_unsigned};

const GET_CART_SQL: &str = include_str!("../sql/get_cart.sql");
const LOCK_CART_SQL: &str = include_str!("../sql/lock_cart.sql");
const UPSERT_CART_SQL: &str = include_str!("../sql/upsert_cart.sql");
const BUMP_CART_VERSION_SQL: &str = include_str!("../sql/bump_cart_version.sql");

/// The `carts` row of an owner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CartRow {
    pub uuid: Uuid,
    pub version: u64,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCartsRepository;

impl PgCartsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Read the cart row, holding a share lock until the transaction ends.
    pub(crate) async fn get_cart(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner: &Owner,
    ) -> Result<Option<CartRow>, sqlx::Error> {
        query_as::<Postgres, CartRow>(GET_CART_SQL)
            .bind(owner.kind.as_str())
            .bind(&owner.id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Read the cart row, holding an exclusive lock until the transaction ends.
    pub(crate) async fn lock_cart(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner: &Owner,
    ) -> Result<Option<CartRow>, sqlx::Error> {
        query_as::<Postgres, CartRow>(LOCK_CART_SQL)
            .bind(owner.kind.as_str())
            .bind(&owner.id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Create the cart at version 1, or bump the version of the existing one.
    pub(crate) async fn upsert_cart(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner: &Owner,
    ) -> Result<CartRow, sqlx::Error> {
        query_as::<Postgres, CartRow>(UPSERT_CART_SQL)
            .bind(Uuid::now_v7())
            .bind(owner.kind.as_str())
            .bind(&owner.id)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn bump_version(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: Uuid,
    ) -> Result<CartRow, sqlx::Error> {
        query_as::<Postgres, CartRow>(BUMP_CART_VERSION_SQL)
            .bind(cart)
            .fetch_one(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for CartRow {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: row.try_get("uuid")?,
            version: try_get_unsigned(row, "version")?,
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

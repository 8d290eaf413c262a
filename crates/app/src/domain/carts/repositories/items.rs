//! Cart Items Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::domain::{
    carts::models::{CartItem, CartItemUuid, ItemStatus, ItemWrite, NewCartItem},
    products::{models::ProductUuid, try_get_unsigned},
};

const GET_CART_ITEMS_SQL: &str = include_str!("../sql/get_cart_items.sql");
const UPSERT_CART_ITEM_SQL: &str = include_str!("../sql/upsert_cart_item.sql");
const UPDATE_ITEM_QUANTITY_SQL: &str = include_str!("../sql/update_item_quantity.sql");
const UPDATE_ITEM_SELECTED_SQL: &str = include_str!("../sql/update_item_selected.sql");
const CONFIRM_ITEM_PRICE_SQL: &str = include_str!("../sql/confirm_item_price.sql");
const UPDATE_ITEM_STATUS_SQL: &str = include_str!("../sql/update_item_status.sql");
const DELETE_CART_ITEM_SQL: &str = include_str!("../sql/delete_cart_item.sql");
const SELECT_ALL_ITEMS_SQL: &str = include_str!("../sql/select_all_items.sql");
const CLEAR_CART_ITEMS_SQL: &str = include_str!("../sql/clear_cart_items.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCartItemsRepository;

impl PgCartItemsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn get_cart_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: Uuid,
    ) -> Result<Vec<CartItem>, sqlx::Error> {
        query_as::<Postgres, CartItem>(GET_CART_ITEMS_SQL)
            .bind(cart)
            .fetch_all(&mut **tx)
            .await
    }

    /// Insert the line, or add to the quantity of the existing line for the same product/SKU.
    pub(crate) async fn upsert_cart_item(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: Uuid,
        item: NewCartItem,
    ) -> Result<CartItem, sqlx::Error> {
        query_as::<Postgres, CartItem>(UPSERT_CART_ITEM_SQL)
            .bind(item.uuid.into_uuid())
            .bind(cart)
            .bind(item.product_uuid.into_uuid())
            .bind(item.sku.unwrap_or_default())
            .bind(i64::from(item.quantity))
            .bind(to_i64(item.price, "price_snapshot")?)
            .fetch_one(&mut **tx)
            .await
    }

    /// Apply a write to the cart's lines, returning the number of affected rows.
    pub(crate) async fn apply_write(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cart: Uuid,
        write: &ItemWrite,
    ) -> Result<u64, sqlx::Error> {
        let statement = match write {
            ItemWrite::SetQuantity { item, quantity } => query(UPDATE_ITEM_QUANTITY_SQL)
                .bind(item.into_uuid())
                .bind(cart)
                .bind(i64::from(*quantity)),
            ItemWrite::SetSelected { item, selected } => query(UPDATE_ITEM_SELECTED_SQL)
                .bind(item.into_uuid())
                .bind(cart)
                .bind(*selected),
            ItemWrite::ConfirmPrice { item } => query(CONFIRM_ITEM_PRICE_SQL)
                .bind(item.into_uuid())
                .bind(cart),
            ItemWrite::SetStatus {
                item,
                status,
                current_price,
            } => query(UPDATE_ITEM_STATUS_SQL)
                .bind(item.into_uuid())
                .bind(cart)
                .bind(status.as_str())
                .bind(
                    current_price
                        .map(|price| to_i64(price, "current_price"))
                        .transpose()?,
                ),
            ItemWrite::Remove { item } => query(DELETE_CART_ITEM_SQL)
                .bind(item.into_uuid())
                .bind(cart),
            ItemWrite::SelectAll { selected } => {
                query(SELECT_ALL_ITEMS_SQL).bind(cart).bind(*selected)
            }
            ItemWrite::Clear => query(CLEAR_CART_ITEMS_SQL).bind(cart),
        };

        Ok(statement.execute(&mut **tx).await?.rows_affected())
    }
}

fn to_i64(value: u64, col: &str) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for CartItem {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let sku: String = row.try_get("sku")?;
        let status: String = row.try_get("status")?;

        let current_price = row
            .try_get::<Option<i64>, _>("current_price")?
            .map(u64::try_from)
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "current_price".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            uuid: CartItemUuid::from_uuid(row.try_get("uuid")?),
            product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            sku: Some(sku).filter(|sku| !sku.is_empty()),
            quantity: try_get_unsigned(row, "quantity")?,
            price_snapshot: try_get_unsigned(row, "price_snapshot")?,
            current_price,
            selected: row.try_get("selected")?,
            status: status
                .parse::<ItemStatus>()
                .map_err(|e| sqlx::Error::ColumnDecode {
                    index: "status".to_string(),
                    source: Box::new(e),
                })?,
            added_at: row.try_get::<SqlxTimestamp, _>("added_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

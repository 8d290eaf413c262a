use clap::Args;
use trolley_app::domain::{
    carts::{
        CartsService,
        models::{CartItemUuid, ItemUpdate},
    },
    products::models::ProductUuid,
};

use super::{OwnerArgs, print_json};

#[derive(Debug, Args)]
pub(crate) struct AddArgs {
    #[command(flatten)]
    owner: OwnerArgs,

    /// Product to add
    #[arg(long)]
    product: ProductUuid,

    /// Optional SKU within the product
    #[arg(long)]
    sku: Option<String>,

    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    quantity: i64,
}

#[derive(Debug, Args)]
pub(crate) struct UpdateArgs {
    #[command(flatten)]
    owner: OwnerArgs,

    /// Line to update
    #[arg(long)]
    item: CartItemUuid,

    /// New quantity; zero or less removes the line
    #[arg(long, allow_negative_numbers = true)]
    quantity: Option<i64>,

    #[arg(long)]
    selected: Option<bool>,

    /// Accept the line's current price
    #[arg(long)]
    confirm_price: bool,
}

#[derive(Debug, Args)]
pub(crate) struct RemoveArgs {
    #[command(flatten)]
    owner: OwnerArgs,

    /// Line to remove
    #[arg(long)]
    item: CartItemUuid,
}

#[derive(Debug, Args)]
pub(crate) struct SelectAllArgs {
    #[command(flatten)]
    owner: OwnerArgs,

    /// Deselect instead of select
    #[arg(long)]
    none: bool,
}

pub(crate) async fn add(carts: &dyn CartsService, args: AddArgs) -> Result<(), String> {
    let item = carts
        .add_item(&args.owner.owner, args.product, args.sku, args.quantity)
        .await
        .map_err(|error| format!("failed to add item: {error}"))?;

    print_json(&item)
}

pub(crate) async fn update(carts: &dyn CartsService, args: UpdateArgs) -> Result<(), String> {
    let update = ItemUpdate {
        quantity: args.quantity,
        selected: args.selected,
        confirm_price: args.confirm_price,
    };

    let item = carts
        .update_item(&args.owner.owner, args.item, update)
        .await
        .map_err(|error| format!("failed to update item: {error}"))?;

    match item {
        Some(item) => print_json(&item),
        None => {
            println!("removed: {}", args.item);

            Ok(())
        }
    }
}

pub(crate) async fn remove(carts: &dyn CartsService, args: RemoveArgs) -> Result<(), String> {
    carts
        .remove_item(&args.owner.owner, args.item)
        .await
        .map_err(|error| format!("failed to remove item: {error}"))?;

    println!("removed: {}", args.item);

    Ok(())
}

pub(crate) async fn clear(carts: &dyn CartsService, args: OwnerArgs) -> Result<(), String> {
    carts
        .clear_cart(&args.owner)
        .await
        .map_err(|error| format!("failed to clear cart: {error}"))?;

    println!("cleared: {}", args.owner);

    Ok(())
}

pub(crate) async fn select_all(carts: &dyn CartsService, args: SelectAllArgs) -> Result<(), String> {
    carts
        .select_all(&args.owner.owner, !args.none)
        .await
        .map_err(|error| format!("failed to update selection: {error}"))?;

    println!("selected: {}", !args.none);

    Ok(())
}

use trolley_app::domain::carts::CartsService;

use super::{OwnerArgs, print_json};

pub(crate) async fn sync(carts: &dyn CartsService, args: OwnerArgs) -> Result<(), String> {
    let result = carts
        .sync_cart_items(&args.owner)
        .await
        .map_err(|error| format!("failed to sync cart: {error}"))?;

    print_json(&result)
}

pub(crate) async fn validate(carts: &dyn CartsService, args: OwnerArgs) -> Result<(), String> {
    let validated = carts
        .validate_cart_items(&args.owner)
        .await
        .map_err(|error| format!("failed to validate cart: {error}"))?;

    print_json(&validated)
}

pub(crate) async fn clean(carts: &dyn CartsService, args: OwnerArgs) -> Result<(), String> {
    let removed = carts
        .clean_invalid_items(&args.owner)
        .await
        .map_err(|error| format!("failed to clean cart: {error}"))?;

    println!("removed: {removed}");

    Ok(())
}

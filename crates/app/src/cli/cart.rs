use clap::Args;
use trolley_app::domain::{carts::CartsService, recommendations::DEFAULT_LIMIT};

use super::{OwnerArgs, print_json};

#[derive(Debug, Args)]
pub(crate) struct ShowArgs {
    #[command(flatten)]
    owner: OwnerArgs,

    /// Include out-of-stock and removed lines
    #[arg(long)]
    include_invalid: bool,
}

#[derive(Debug, Args)]
pub(crate) struct RecommendArgs {
    #[command(flatten)]
    owner: OwnerArgs,

    /// Maximum number of recommendations
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,
}

pub(crate) async fn show(carts: &dyn CartsService, args: ShowArgs) -> Result<(), String> {
    let view = carts
        .get_cart(&args.owner.owner, args.include_invalid)
        .await
        .map_err(|error| format!("failed to load cart: {error}"))?;

    print_json(&view)
}

pub(crate) async fn count(carts: &dyn CartsService, args: OwnerArgs) -> Result<(), String> {
    let count = carts
        .item_count(&args.owner)
        .await
        .map_err(|error| format!("failed to count items: {error}"))?;

    println!("{count}");

    Ok(())
}

pub(crate) async fn recommend(carts: &dyn CartsService, args: RecommendArgs) -> Result<(), String> {
    let recommendations = carts.recommend(&args.owner.owner, args.limit).await;

    print_json(&recommendations)
}

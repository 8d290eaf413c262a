use clap::Args;
use trolley_app::domain::carts::CartsService;

use super::OwnerArgs;

#[derive(Debug, Args)]
pub(crate) struct CalculateArgs {
    #[command(flatten)]
    owner: OwnerArgs,

    /// Shipping region code
    #[arg(long)]
    region: String,

    /// Coupon to apply
    #[arg(long)]
    coupon: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct ShippingArgs {
    #[command(flatten)]
    owner: OwnerArgs,

    /// Shipping region code
    #[arg(long)]
    region: String,
}

pub(crate) async fn calculate(carts: &dyn CartsService, args: CalculateArgs) -> Result<(), String> {
    let calculation = carts
        .calculate(&args.owner.owner, &args.region, args.coupon)
        .await
        .map_err(|error| format!("failed to calculate cart: {error}"))?;

    println!("subtotal: {}", calculation.subtotal_amount);
    println!("selected: {}", calculation.selected_amount);
    println!("discount: {}", calculation.total_discount);
    println!("shipping: {}", calculation.shipping_fee);
    println!("payable: {}", calculation.payable_amount);

    if let Some(coupon) = calculation.applied_coupon {
        println!("coupon: {coupon}");
    }

    if let Some(tier) = calculation.applied_tier {
        println!("tier: {tier}");
    }

    Ok(())
}

pub(crate) async fn shipping(carts: &dyn CartsService, args: ShippingArgs) -> Result<(), String> {
    let fee = carts
        .estimate_shipping(&args.owner.owner, &args.region)
        .await
        .map_err(|error| format!("failed to estimate shipping: {error}"))?;

    println!("shipping: {fee}");

    Ok(())
}

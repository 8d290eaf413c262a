use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use trolley_app::{
    config::AppConfig,
    context::AppContext,
    domain::carts::{CartsService, models::Owner},
    observability,
};

mod cart;
mod items;
mod pricing;
mod sync;

#[derive(Debug, Parser)]
#[command(name = "trolley", about = "Trolley cart CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    config: AppConfig,

    /// Print cache counters after the command
    #[arg(long, global = true)]
    cache_stats: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Cart owner, as `user:<id>` or `guest:<id>`.
#[derive(Debug, Args)]
pub(crate) struct OwnerArgs {
    #[arg(long, env = "CART_OWNER")]
    owner: Owner,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Show the cart
    Show(cart::ShowArgs),
    /// Add a product to the cart
    Add(items::AddArgs),
    /// Change a line's quantity or selection, or confirm its new price
    Update(items::UpdateArgs),
    /// Remove a line
    Remove(items::RemoveArgs),
    /// Remove every line
    Clear(OwnerArgs),
    /// Select or deselect every line
    SelectAll(items::SelectAllArgs),
    /// Print the number of items in the cart
    Count(OwnerArgs),
    /// Check lines against the catalog and store the outcome
    Sync(OwnerArgs),
    /// Check lines against the catalog without storing anything
    Validate(OwnerArgs),
    /// Delete out-of-stock and removed lines
    Clean(OwnerArgs),
    /// Calculate cart totals
    Calculate(pricing::CalculateArgs),
    /// Estimate shipping for the selected lines
    Shipping(pricing::ShippingArgs),
    /// Recommend products for the cart
    Recommend(cart::RecommendArgs),
}

impl Cli {
    /// Parse flags and environment, loading `.env` first.
    pub(crate) fn load() -> Result<Self, clap::Error> {
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    pub(crate) async fn run(self) -> Result<(), String> {
        observability::init_logging(&self.config.logging)
            .map_err(|error| format!("failed to initialise logging: {error}"))?;

        if matches!(self.command, Commands::Migrate) {
            AppContext::migrate(&self.config)
                .await
                .map_err(|error| format!("failed to migrate database: {error}"))?;

            println!("migrations applied");

            return Ok(());
        }

        let ctx = AppContext::connect(&self.config)
            .await
            .map_err(|error| format!("failed to start: {error}"))?;

        let result = dispatch(self.command, ctx.carts.as_ref()).await;

        if self.cache_stats {
            match ctx.cache_metrics() {
                Some(metrics) => print_json(&metrics)?,
                None => println!("cache disabled"),
            }
        }

        ctx.close().await;

        result
    }
}

async fn dispatch(command: Commands, carts: &dyn CartsService) -> Result<(), String> {
    match command {
        Commands::Migrate => Ok(()),
        Commands::Show(args) => cart::show(carts, args).await,
        Commands::Add(args) => items::add(carts, args).await,
        Commands::Update(args) => items::update(carts, args).await,
        Commands::Remove(args) => items::remove(carts, args).await,
        Commands::Clear(args) => items::clear(carts, args).await,
        Commands::SelectAll(args) => items::select_all(carts, args).await,
        Commands::Count(args) => cart::count(carts, args).await,
        Commands::Sync(args) => sync::sync(carts, args).await,
        Commands::Validate(args) => sync::validate(carts, args).await,
        Commands::Clean(args) => sync::clean(carts, args).await,
        Commands::Calculate(args) => pricing::calculate(carts, args).await,
        Commands::Shipping(args) => pricing::shipping(carts, args).await,
        Commands::Recommend(args) => cart::recommend(carts, args).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|error| format!("failed to encode output: {error}"))?;

    println!("{json}");

    Ok(())
}

//! Application configuration
//!
//! Every setting can be given as a flag or through the environment; a `.env` file is loaded
//! first when present.

use clap::Args;

pub mod cache;
pub mod db;
pub mod observability;
pub mod pricing;
pub mod timeouts;

pub use cache::CacheConfig;
pub use db::DatabaseConfig;
pub use observability::{LogFormat, LoggingConfig};
pub use pricing::PricingConfig;
pub use timeouts::TimeoutConfig;

/// Settings shared by every command.
#[derive(Debug, Args)]
pub struct AppConfig {
    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Cart store database settings.
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Cart cache settings.
    #[command(flatten)]
    pub cache: CacheConfig,

    /// Store and catalog call deadlines.
    #[command(flatten)]
    pub timeouts: TimeoutConfig,

    /// Promotion and shipping rules.
    #[command(flatten)]
    pub pricing: PricingConfig,
}

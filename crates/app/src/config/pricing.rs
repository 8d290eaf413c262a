//! Pricing Config

use std::path::PathBuf;

use clap::Args;

#[derive(Debug, Args)]
pub struct PricingConfig {
    /// Path to the YAML promotion and shipping rules
    #[arg(long, env = "PRICING_RULES", default_value = "pricing.yaml")]
    pub pricing_rules: PathBuf,
}

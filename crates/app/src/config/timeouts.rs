//! Call deadline Config

use std::time::Duration;

use clap::Args;

#[derive(Debug, Args)]
pub struct TimeoutConfig {
    /// Deadline for a single cart store call in milliseconds
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 2_000_u64)]
    pub store_timeout_ms: u64,

    /// Deadline for a single product lookup in milliseconds
    #[arg(long, env = "ORACLE_TIMEOUT_MS", default_value_t = 1_000_u64)]
    pub oracle_timeout_ms: u64,
}

impl TimeoutConfig {
    #[must_use]
    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    #[must_use]
    pub fn oracle(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}

//! Product lookup errors.

use sqlx::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProductOracleError {
    #[error("product lookup timed out")]
    Timeout,

    #[error("storage error")]
    Sql(#[from] Error),
}

//! Carts

pub mod errors;
pub mod memory;
pub mod models;
mod repositories;
pub mod service;
pub mod store;

pub use errors::{CartsServiceError, StoreError};
pub use memory::MemoryCartStore;
pub use service::*;
pub use store::{CartStore, MockCartStore, PgCartStore};

//! Shared fixtures for service-level tests.


pub use catalog::MemoryCatalog;
pub use context::TestContext;
pub use db::TestDb;

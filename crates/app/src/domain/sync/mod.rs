//! Cart synchronization against the live catalog.

pub mod engine;
pub mod models;

pub use engine::SyncEngine;
pub use models::{ItemReport, SyncResult, ValidatedCart};

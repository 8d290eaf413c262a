//! Cart consistency services: cached cart access, catalog sync, pricing and recommendations.

pub mod config;
pub mod context;
pub mod database;
pub mod domain;
pub mod observability;

mod deadline;
#[cfg(test)]
mod test;
mod uuids;

//! tripkeep-core
//!
//! Referential integrity checks and schema migration for trip records.
//! Depends on tripkeep-domain. No filesystem access.

pub mod error;
pub mod integrity;
pub mod migration;
pub mod time;

pub use error::CoreError;
pub use integrity::*;
pub use migration::*;
pub use time::*;

#[cfg(test)]
mod tests;

//! tripkeep-config
//!
//! Store settings (data root, backup retention defaults, log filter) and
//! their on-disk persistence.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::ConfigManager;
pub use model::{StoreConfig, DATA_ROOT_ENV};

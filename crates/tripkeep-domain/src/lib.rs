//! tripkeep-domain
//!
//! Pure data model for trip records, their travel and cost sub-entities, and
//! backup catalog entries. No I/O, no storage. Only data types and traversal.

pub mod backup;
pub mod lenient;
pub mod links;
pub mod trip;

pub use backup::*;
pub use links::*;
pub use trip::*;

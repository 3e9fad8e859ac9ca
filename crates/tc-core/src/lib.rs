//! tanicare/crates/tc-core/src/lib.rs
//!
//! The central domain logic and interface definitions for TaniCare:
//! the region directory, the thread aggregator, accounts, and the ports
//! their adapters implement.

pub mod accounts;
pub mod aggregator;
pub mod directory;
pub mod document;
pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use accounts::{AccountService, ProfileUpdate};
pub use aggregator::ThreadAggregator;
pub use directory::RegionDirectory;
pub use error::*;
pub use models::*;
pub use traits::*;

//! Storage tiers for artifact persistence
//!
//! This module provides two tiers behind one store:
//! 1. SQLite database (primary)
//! 2. JSON file (fallback, size-capped)

mod traits;
mod sqlite;
mod json_file;
mod store;

pub use traits::ArtifactTier;
pub use sqlite::SqliteTier;
pub use json_file::{JsonFileTier, DEFAULT_CAPACITY_BYTES};
pub use store::{ArtifactStore, StoreConfig, StoreStatus, Tier};

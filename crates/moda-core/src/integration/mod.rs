//! Helpers shared by connectors that sync work items from external systems.

pub mod cache_key;

pub use cache_key::{CacheKey, CacheKeyBuilder, CacheKeyError};

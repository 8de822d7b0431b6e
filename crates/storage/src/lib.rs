//! Rendered-tile cache backends for the hazard tile service.
//!
//! Provides one interface over:
//! - An in-process LRU with a byte budget and lazy TTL expiry
//! - Redis, for caches shared between service replicas

pub mod backend;
pub mod cache;
pub mod tile_memory_cache;

pub use backend::{tile_cache_key, CacheBackend};
pub use cache::RedisTileCache;
pub use tile_memory_cache::{MemoryCacheStats, TileMemoryCache};

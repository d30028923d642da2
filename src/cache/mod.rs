//! Cache Module
//!
//! Provides namespace-local in-memory caching with TTL expiration.

mod entry;
mod events;
mod pattern;
mod stats;
mod store;


// Re-export public types
pub use entry::{ttl_from_secs, CacheEntry};
pub use events::{tracing_hook, CacheEvent, EventHook};
pub use pattern::{generate_key, KeyPattern};
pub use stats::{hit_rate_percent, CacheStats, GlobalCounters, GlobalStats};
pub use store::{CacheStore, CacheValue};

//! nscache - An in-process, namespaced TTL cache
//!
//! A fixed set of independent namespaces with per-key expiry timers, a
//! background sweeper, global statistics, and a response memoization
//! middleware.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod tasks;

pub use api::AppState;
pub use config::{Config, NamespaceConfig};
pub use middleware::{CacheStatus, CacheableResponse, CachingMiddleware};
pub use registry::{CacheRegistry, RegistryStats};
pub use tasks::spawn_sweeper;

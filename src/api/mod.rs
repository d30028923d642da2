//! API Module
//!
//! HTTP handlers and routing for the cache management API: statistics,
//! flushing, and per-namespace key operations.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache statistics
//! - `POST /flush[/:namespace]` - Flush all or one namespace
//! - `/cache/:namespace[/:key]` - Key operations
//! - `POST /mget|mset|invalidate/:namespace` - Bulk operations

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

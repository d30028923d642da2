//! Response DTOs for the cache management API
//!
//! Defines the structure of outgoing HTTP response bodies. The stats
//! endpoint serves [`RegistryStats`](crate::registry::RegistryStats) as is.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// Response body for `GET /cache/:namespace/:key`
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub namespace: String,
    pub key: String,
    pub value: Value,
    /// Remaining TTL in whole seconds, None if the entry never expires
    pub ttl_remaining: Option<u64>,
}

/// Response body for `PUT /cache/:namespace` and `POST /mset/:namespace`
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub message: String,
    pub namespace: String,
    pub keys: usize,
}

impl SetResponse {
    pub fn new(namespace: impl Into<String>, keys: usize) -> Self {
        let namespace = namespace.into();
        Self {
            message: format!("{} key(s) set in '{}'", keys, namespace),
            namespace,
            keys,
        }
    }
}

/// Response body for `DELETE /cache/:namespace/:key` and invalidation
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub namespace: String,
    pub deleted: usize,
}

/// Response body for `GET /cache/:namespace`
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub namespace: String,
    pub keys: Vec<String>,
}

/// Response body for `POST /mget/:namespace`
#[derive(Debug, Clone, Serialize)]
pub struct MgetResponse {
    pub namespace: String,
    pub values: HashMap<String, Value>,
}

/// Response body for the flush endpoints
#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    pub message: String,
}

impl FlushResponse {
    pub fn new(target: &str) -> Self {
        Self {
            message: format!("Flushed {}", target),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Configured namespaces
    pub namespaces: Vec<String>,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(namespaces: Vec<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            namespaces,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

//! Request DTOs for the cache management API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Request body for `PUT /cache/:namespace`
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds; negative values expire immediately
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key)
    }
}

/// Request body for `POST /mget/:namespace`
#[derive(Debug, Clone, Deserialize)]
pub struct MgetRequest {
    pub keys: Vec<String>,
}

/// Request body for `POST /mset/:namespace`
#[derive(Debug, Clone, Deserialize)]
pub struct MsetRequest {
    pub entries: HashMap<String, Value>,
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl MsetRequest {
    pub fn validate(&self) -> Option<String> {
        self.entries.keys().find_map(|key| validate_key(key))
    }
}

/// Request body for `POST /invalidate/:namespace`
///
/// `pattern` is a substring unless `regex` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub pattern: String,
    #[serde(default)]
    pub regex: bool,
}

fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    None
}

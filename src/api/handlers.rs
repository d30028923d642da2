//! API Handlers
//!
//! HTTP request handlers for the cache management endpoints. They are thin
//! pass-throughs to [`CacheRegistry`].

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::ttl_from_secs;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, FlushResponse, GetResponse, HealthResponse, InvalidateRequest, KeysResponse,
    MgetRequest, MgetResponse, MsetRequest, SetRequest, SetResponse,
};
use crate::registry::{CacheRegistry, RegistryStats};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CacheRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self { registry }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(CacheRegistry::from_config(config)))
    }
}

fn ensure_namespace(state: &AppState, namespace: &str) -> Result<()> {
    if state.registry.has_namespace(namespace) {
        Ok(())
    } else {
        Err(CacheError::NamespaceNotFound(namespace.to_string()))
    }
}

/// Handler for PUT /cache/:namespace
pub async fn set_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    ensure_namespace(&state, &namespace)?;

    let ttl = req.ttl.map(ttl_from_secs);
    if !state.registry.set(&namespace, &req.key, &req.value, ttl) {
        return Err(CacheError::InvalidRequest(format!(
            "Value for '{}' could not be stored",
            req.key
        )));
    }

    Ok(Json(SetResponse::new(namespace, 1)))
}

/// Handler for GET /cache/:namespace/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    ensure_namespace(&state, &namespace)?;

    let value = state
        .registry
        .get(&namespace, &key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;
    let ttl_remaining = state
        .registry
        .ttl(&namespace, &key)
        .flatten()
        .map(|ttl| ttl.as_secs());

    Ok(Json(GetResponse {
        namespace,
        key,
        value,
        ttl_remaining,
    }))
}

/// Handler for DELETE /cache/:namespace/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    ensure_namespace(&state, &namespace)?;

    let deleted = state.registry.del(&namespace, &key);
    if deleted == 0 {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse { namespace, deleted }))
}

/// Handler for GET /cache/:namespace
pub async fn keys_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<KeysResponse>> {
    ensure_namespace(&state, &namespace)?;

    let mut keys = state.registry.keys(&namespace);
    keys.sort_unstable();

    Ok(Json(KeysResponse { namespace, keys }))
}

/// Handler for POST /mget/:namespace
pub async fn mget_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(req): Json<MgetRequest>,
) -> Result<Json<MgetResponse>> {
    ensure_namespace(&state, &namespace)?;

    let values = state.registry.mget(&namespace, req.keys.as_slice());

    Ok(Json(MgetResponse { namespace, values }))
}

/// Handler for POST /mset/:namespace
pub async fn mset_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(req): Json<MsetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    ensure_namespace(&state, &namespace)?;

    let ttl = req.ttl.map(ttl_from_secs);
    if !state.registry.mset(&namespace, req.entries.iter(), ttl) {
        return Err(CacheError::InvalidRequest(format!(
            "Not every value could be stored in '{}'",
            namespace
        )));
    }

    Ok(Json(SetResponse::new(namespace, req.entries.len())))
}

/// Handler for POST /invalidate/:namespace
///
/// An invalid regular expression matches nothing.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<DeleteResponse>> {
    ensure_namespace(&state, &namespace)?;

    let deleted = if req.regex {
        state.registry.invalidate_regex(&namespace, &req.pattern)
    } else {
        state.registry.invalidate_pattern(&namespace, req.pattern.as_str())
    };

    Ok(Json(DeleteResponse { namespace, deleted }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<RegistryStats> {
    Json(state.registry.get_stats())
}

/// Handler for POST /flush
pub async fn flush_all_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    state.registry.flush_all();
    Json(FlushResponse::new("all namespaces"))
}

/// Handler for POST /flush/:namespace
pub async fn flush_namespace_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<FlushResponse>> {
    ensure_namespace(&state, &namespace)?;
    state.registry.flush_namespace(&namespace);
    Ok(Json(FlushResponse::new(&format!("namespace '{}'", namespace))))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let namespaces = state
        .registry
        .namespaces()
        .into_iter()
        .map(String::from)
        .collect();
    Json(HealthResponse::healthy(namespaces))
}

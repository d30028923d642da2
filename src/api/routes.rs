//! API Routes
//!
//! Configures the Axum router with the cache management endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, flush_all_handler, flush_namespace_handler, get_handler, health_handler,
    invalidate_handler, keys_handler, mget_handler, mset_handler, set_handler, stats_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /stats` - Global and per-namespace statistics
/// - `POST /flush` - Flush every namespace
/// - `POST /flush/:namespace` - Flush one namespace
/// - `PUT /cache/:namespace` - Store a key-value pair
/// - `GET /cache/:namespace` - List live keys
/// - `GET /cache/:namespace/:key` - Retrieve a value by key
/// - `DELETE /cache/:namespace/:key` - Delete a key
/// - `POST /mget/:namespace` - Retrieve several keys
/// - `POST /mset/:namespace` - Store several keys
/// - `POST /invalidate/:namespace` - Delete keys matching a pattern
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/flush", post(flush_all_handler))
        .route("/flush/:namespace", post(flush_namespace_handler))
        .route("/cache/:namespace", get(keys_handler).put(set_handler))
        .route(
            "/cache/:namespace/:key",
            get(get_handler).delete(delete_handler),
        )
        .route("/mget/:namespace", post(mget_handler))
        .route("/mset/:namespace", post(mset_handler))
        .route("/invalidate/:namespace", post(invalidate_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NamespaceConfig;
    use crate::registry::CacheRegistry;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let registry = CacheRegistry::new(vec![NamespaceConfig::new("users")]);
        create_router(AppState::new(Arc::new(registry)))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/cache/users")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"user:1","value":{"name":"ada"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_namespace() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cache/ghosts/k")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_flush_unknown_namespace() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/flush/ghosts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

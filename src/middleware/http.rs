//! Axum binding for [`CachingMiddleware`].
//!
//! ```ignore
//! let cache = Arc::new(CachingMiddleware::new(registry, "api", path_key));
//! let app = Router::new()
//!     .route("/leaderboard/:board", get(leaderboard))
//!     .layer(axum::middleware::from_fn_with_state(cache, cache_responses));
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{CacheStatus, CacheableResponse, CachingMiddleware, CACHE_STATUS_HEADER};
use crate::cache::generate_key;

/// A fully buffered HTTP response in a form the registry can store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedHttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    #[serde(skip)]
    pub cache_status: Option<CacheStatus>,
}

impl CachedHttpResponse {
    /// Buffers `response`. Headers with non-text values are dropped.
    pub async fn from_response(response: Response) -> Self {
        let (parts, body) = response.into_parts();

        let body = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes.to_vec(),
            Err(err) => {
                warn!("Failed to buffer response body: {}", err);
                return Self {
                    status: StatusCode::BAD_GATEWAY.as_u16(),
                    headers: Vec::new(),
                    body: Vec::new(),
                    cache_status: None,
                };
            }
        };

        let headers = parts
            .headers
            .iter()
            .filter(|(name, _)| keep_header(name))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        Self {
            status: parts.status.as_u16(),
            headers,
            body,
            cache_status: None,
        }
    }
}

impl CacheableResponse for CachedHttpResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn set_cache_status(&mut self, status: CacheStatus) {
        self.cache_status = Some(status);
    }
}

impl IntoResponse for CachedHttpResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                headers.append(name, value);
            }
        }
        if let Some(status) = self.cache_status {
            headers.insert(
                HeaderName::from_static(CACHE_STATUS_HEADER),
                HeaderValue::from_static(status.as_str()),
            );
        }
        response
    }
}

/// Drops headers describing the original transfer rather than the content.
fn keep_header(name: &HeaderName) -> bool {
    *name != header::CONTENT_LENGTH
        && *name != header::TRANSFER_ENCODING
        && *name != header::CONNECTION
        && *name != CACHE_STATUS_HEADER
}

/// Middleware function for `axum::middleware::from_fn_with_state`.
///
/// Only `GET` and `HEAD` requests are memoized; any other method always
/// reaches the wrapped handler.
pub async fn cache_responses(
    State(cache): State<Arc<CachingMiddleware<Request>>>,
    request: Request,
    next: Next,
) -> Response {
    if !is_cacheable_method(request.method()) {
        return next.run(request).await;
    }

    cache
        .handle(request, |request| async move {
            CachedHttpResponse::from_response(next.run(request).await).await
        })
        .await
        .into_response()
}

fn is_cacheable_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Keys a request by method, path and query, e.g. `GET:/leaderboard/weekly?page=2`.
pub fn path_key(request: &Request) -> String {
    let uri = request.uri();
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    generate_key(request.method().as_str(), [target])
}

//! Observability hook fired on cache mutations.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

/// Something that happened to a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Set { namespace: String, key: String },
    Delete { namespace: String, key: String },
    /// Entry removed because its TTL elapsed (timer, sweep or lazy read)
    Expire { namespace: String, key: String },
    Flush { namespace: String },
    Error { namespace: String, message: String },
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheEvent::Set { namespace, key } => write!(f, "set {namespace}/{key}"),
            CacheEvent::Delete { namespace, key } => write!(f, "del {namespace}/{key}"),
            CacheEvent::Expire { namespace, key } => write!(f, "expire {namespace}/{key}"),
            CacheEvent::Flush { namespace } => write!(f, "flush {namespace}"),
            CacheEvent::Error { namespace, message } => write!(f, "error {namespace}: {message}"),
        }
    }
}

/// Callback invoked for every [`CacheEvent`]. Called outside store locks.
pub type EventHook = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Hook that forwards events to `tracing`.
pub fn tracing_hook() -> EventHook {
    Arc::new(|event: &CacheEvent| match event {
        CacheEvent::Error { .. } => warn!("cache {}", event),
        _ => debug!("cache {}", event),
    })
}

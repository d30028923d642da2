//! Expiry Sweeper
//!
//! Background task that periodically removes expired entries from one
//! namespace. Per-key timers do the regular work; the sweep catches entries
//! whose timer never ran.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheStore, CacheValue};

/// Spawns a background task that periodically sweeps `store`.
///
/// The task sleeps for `interval` between passes. Each pass holds the
/// store lock only while scanning and deleting.
///
/// # Returns
/// `None` when `interval` is zero (sweeping disabled), otherwise a
/// JoinHandle which can be used to abort the task during shutdown.
///
/// # Example
/// ```ignore
/// let store = CacheStore::new(NamespaceConfig::new("sessions"));
/// let sweeper = spawn_sweeper(store.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// if let Some(handle) = sweeper { handle.abort(); }
/// ```
pub fn spawn_sweeper<V: CacheValue>(
    store: CacheStore<V>,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        debug!("Sweeping disabled for namespace '{}'", store.name());
        return None;
    }

    Some(tokio::spawn(async move {
        info!(
            "Starting sweeper for namespace '{}' with interval of {:?}",
            store.name(),
            interval
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.sweep();

            if removed > 0 {
                info!(
                    "Sweep of '{}': removed {} expired entries",
                    store.name(),
                    removed
                );
            } else {
                debug!("Sweep of '{}': no expired entries found", store.name());
            }
        }
    }))
}

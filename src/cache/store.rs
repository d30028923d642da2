//! Cache Store Module
//!
//! One namespace's key space: entries, their pending expiry timers and the
//! namespace statistics, all behind a single lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::cache::{CacheEntry, CacheEvent, CacheStats, EventHook};
use crate::config::NamespaceConfig;
use crate::error::Result;

/// Bound for anything a store can hold.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

// == Cache Store ==
/// A namespace-local TTL cache.
///
/// Cloning is cheap and yields a handle to the same namespace. Expiry is
/// driven by a one-shot timer per key when a tokio runtime is available;
/// reads never return an expired entry regardless of timer state, and
/// [`sweep`](Self::sweep) removes whatever a lost timer left behind.
pub struct CacheStore<V> {
    inner: Arc<StoreInner<V>>,
}

struct StoreInner<V> {
    config: NamespaceConfig,
    state: Mutex<StoreState<V>>,
    hook: Option<EventHook>,
}

struct StoreState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    timers: HashMap<String, ExpiryTimer>,
    stats: CacheStats,
    next_timer_id: u64,
}

struct ExpiryTimer {
    id: u64,
    handle: AbortHandle,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CacheStore")
            .field("name", &self.inner.config.name)
            .field("entries", &state.entries.len())
            .field("timers", &state.timers.len())
            .finish()
    }
}

impl<V> StoreState<V> {
    fn cancel_timer(&mut self, key: &str) {
        if let Some(timer) = self.timers.remove(key) {
            timer.handle.abort();
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        self.cancel_timer(key);
        let removed = self.entries.remove(key);
        self.stats.set_keys(self.entries.len());
        removed
    }

    /// Lazy deletion. Returns true when `key` was present but expired.
    fn purge_if_expired(&mut self, key: &str, now: Instant) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now));
        if expired {
            self.remove(key);
        }
        expired
    }

    fn remove_expired(&mut self, now: Instant) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired
    }
}

impl<V> StoreInner<V> {
    fn emit(&self, event: impl FnOnce() -> CacheEvent) {
        if let Some(hook) = &self.hook {
            hook(&event());
        }
    }

    fn emit_expired(&self, keys: Vec<String>) {
        for key in keys {
            self.emit(|| CacheEvent::Expire {
                namespace: self.config.name.clone(),
                key,
            });
        }
    }

    /// Timer callback. A timer that was cancelled or replaced after it woke
    /// up finds a different id (or none) and does nothing.
    fn fire_timer(&self, key: &str, id: u64) {
        let expired = {
            let mut state = self.state.lock();
            match state.timers.get(key) {
                Some(timer) if timer.id == id => {}
                _ => {
                    trace!("stale expiry timer for {}/{}", self.config.name, key);
                    return;
                }
            }
            state.timers.remove(key);
            state.purge_if_expired(key, Instant::now())
        };

        if expired {
            self.emit_expired(vec![key.to_string()]);
        }
    }
}

impl<V: CacheValue> CacheStore<V> {
    // == Constructor ==
    /// Creates an empty store for the given namespace configuration.
    pub fn new(config: NamespaceConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates an empty store reporting mutations to `hook`.
    pub fn with_hook(config: NamespaceConfig, hook: EventHook) -> Self {
        Self::build(config, Some(hook))
    }

    fn build(config: NamespaceConfig, hook: Option<EventHook>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                state: Mutex::new(StoreState {
                    entries: HashMap::new(),
                    timers: HashMap::new(),
                    stats: CacheStats::new(),
                    next_timer_id: 0,
                }),
                hook,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &NamespaceConfig {
        &self.inner.config
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut events = Vec::new();
        let value = {
            let mut state = self.inner.state.lock();
            self.read_locked(&mut state, key, Instant::now(), &mut events)
        };
        self.emit_all(events);
        value
    }

    // == Set ==
    /// Stores a copy of `value` under `key`.
    ///
    /// The TTL is `ttl` when given, else the namespace default, else none.
    /// Any pending timer for the key is cancelled before the new one is
    /// installed. Returns false only if the value could not be copied.
    pub fn set(&self, key: impl Into<String>, value: &V, ttl: Option<Duration>) -> bool {
        let key = key.into();
        let value = match self.copy_value(value) {
            Ok(value) => value,
            Err(err) => {
                self.inner.emit(|| CacheEvent::Error {
                    namespace: self.name().to_string(),
                    message: format!("set {key}: {err}"),
                });
                return false;
            }
        };

        let entry = CacheEntry::new(value, ttl.or(self.inner.config.default_ttl));
        let deadline = entry.expires_at;
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.cancel_timer(&key);
            state.entries.insert(key.clone(), entry);
            state.stats.set_keys(state.entries.len());
            if let Some(deadline) = deadline {
                self.schedule_expiry(state, &key, deadline);
            }
        }

        self.inner.emit(|| CacheEvent::Set {
            namespace: self.name().to_string(),
            key,
        });
        true
    }

    // == Has ==
    /// Returns true if `key` holds an unexpired value. Does not touch hit/miss counters.
    pub fn has(&self, key: &str) -> bool {
        let (present, expired) = {
            let mut state = self.inner.state.lock();
            let expired = state.purge_if_expired(key, Instant::now());
            (state.entries.contains_key(key), expired)
        };
        if expired {
            self.inner.emit_expired(vec![key.to_string()]);
        }
        present
    }

    // == Delete ==
    /// Removes an entry and cancels its timer. Returns the number removed (0 or 1).
    pub fn del(&self, key: &str) -> usize {
        let removed = self.inner.state.lock().remove(key).is_some();
        if removed {
            self.inner.emit(|| CacheEvent::Delete {
                namespace: self.name().to_string(),
                key: key.to_string(),
            });
        }
        usize::from(removed)
    }

    /// Removes every listed key, returning how many were present.
    pub fn del_many<K: AsRef<str>>(&self, keys: &[K]) -> usize {
        keys.iter().map(|key| self.del(key.as_ref())).sum()
    }

    // == TTL ==
    /// Remaining time to live of `key`.
    ///
    /// Outer `None` when the key is absent; `Some(None)` when it never expires.
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let (ttl, expired) = {
            let mut state = self.inner.state.lock();
            let expired = state.purge_if_expired(key, Instant::now());
            (state.entries.get(key).map(CacheEntry::ttl_remaining), expired)
        };
        if expired {
            self.inner.emit_expired(vec![key.to_string()]);
        }
        ttl
    }

    // == Keys ==
    /// Lists live keys. Expired entries found while listing are deleted.
    pub fn keys(&self) -> Vec<String> {
        let (keys, expired) = {
            let mut state = self.inner.state.lock();
            let expired = state.remove_expired(Instant::now());
            (state.entries.keys().cloned().collect(), expired)
        };
        self.inner.emit_expired(expired);
        keys
    }

    // == Multi Get ==
    /// Returns every present, unexpired key among `keys`; absent keys are omitted.
    pub fn mget<K: AsRef<str>>(&self, keys: &[K]) -> HashMap<String, V> {
        let mut events = Vec::new();
        let mut found = HashMap::with_capacity(keys.len());
        {
            let mut state = self.inner.state.lock();
            let now = Instant::now();
            for key in keys {
                let key = key.as_ref();
                if let Some(value) = self.read_locked(&mut state, key, now, &mut events) {
                    found.insert(key.to_string(), value);
                }
            }
        }
        self.emit_all(events);
        found
    }

    // == Multi Set ==
    /// Applies [`set`](Self::set) to every pair. Returns false if any value failed to copy.
    pub fn mset<'a, K, I>(&self, entries: I, ttl: Option<Duration>) -> bool
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, &'a V)>,
    {
        entries
            .into_iter()
            .fold(true, |ok, (key, value)| self.set(key.as_ref(), value, ttl) && ok)
    }

    // == Flush ==
    /// Clears all entries and cancels every pending timer. Hit/miss counters survive.
    pub fn flush_all(&self) {
        {
            let mut state = self.inner.state.lock();
            for (_, timer) in state.timers.drain() {
                timer.handle.abort();
            }
            state.entries.clear();
            state.stats.set_keys(0);
        }
        self.inner.emit(|| CacheEvent::Flush {
            namespace: self.name().to_string(),
        });
    }

    // == Sweep ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let expired = self.inner.state.lock().remove_expired(Instant::now());
        let count = expired.len();
        self.inner.emit_expired(expired);
        count
    }

    // == Stats ==
    /// Returns current namespace statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock();
        let mut stats = state.stats.clone();
        stats.set_keys(state.entries.len());
        stats
    }

    /// Number of entries held, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of scheduled expiry timers.
    pub fn pending_timers(&self) -> usize {
        self.inner.state.lock().timers.len()
    }

    fn read_locked(
        &self,
        state: &mut StoreState<V>,
        key: &str,
        now: Instant,
        events: &mut Vec<CacheEvent>,
    ) -> Option<V> {
        if state.purge_if_expired(key, now) {
            events.push(CacheEvent::Expire {
                namespace: self.name().to_string(),
                key: key.to_string(),
            });
        }

        let copied = state.entries.get(key).map(|entry| self.copy_value(&entry.value));
        match copied {
            Some(Ok(value)) => {
                state.stats.record_hit();
                Some(value)
            }
            Some(Err(err)) => {
                state.stats.record_miss();
                events.push(CacheEvent::Error {
                    namespace: self.name().to_string(),
                    message: format!("get {key}: {err}"),
                });
                None
            }
            None => {
                state.stats.record_miss();
                None
            }
        }
    }

    fn emit_all(&self, events: Vec<CacheEvent>) {
        for event in events {
            self.inner.emit(|| event);
        }
    }

    fn copy_value(&self, value: &V) -> Result<V> {
        if self.inner.config.copy_values {
            Ok(serde_json::from_value(serde_json::to_value(value)?)?)
        } else {
            Ok(value.clone())
        }
    }

    /// Installs the one-shot timer for `key`. Without a runtime there is
    /// nothing to schedule on; lazy expiry and sweeps still apply.
    fn schedule_expiry(&self, state: &mut StoreState<V>, key: &str, deadline: Instant) {
        let Ok(runtime) = Handle::try_current() else {
            trace!("no runtime, expiry of {}/{} left to reads and sweeps", self.name(), key);
            return;
        };

        state.next_timer_id += 1;
        let id = state.next_timer_id;
        let store: Weak<StoreInner<V>> = Arc::downgrade(&self.inner);
        let timer_key = key.to_string();

        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = store.upgrade() {
                inner.fire_timer(&timer_key, id);
            }
        });

        state.timers.insert(
            key.to_string(),
            ExpiryTimer {
                id,
                handle: handle.abort_handle(),
            },
        );
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::sleep;

    fn store() -> CacheStore<String> {
        CacheStore::new(NamespaceConfig::new("test"))
    }

    fn recording_store() -> (CacheStore<String>, Arc<Mutex<Vec<CacheEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let hook: EventHook = Arc::new(move |event: &CacheEvent| sink.lock().push(event.clone()));
        (
            CacheStore::with_hook(NamespaceConfig::new("test"), hook),
            events,
        )
    }

    #[test]
    fn test_store_new() {
        let store = store();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.name(), "test");
    }

    #[test]
    fn test_store_set_and_get() {
        let store = store();

        assert!(store.set("key1", &"value1".to_string(), None));
        assert_eq!(store.get("key1").as_deref(), Some("value1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let store = store();

        assert!(store.get("nonexistent").is_none());
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_delete() {
        let store = store();

        store.set("key1", &"value1".to_string(), None);
        assert_eq!(store.del("key1"), 1);
        assert_eq!(store.del("key1"), 0);

        assert!(store.is_empty());
        assert!(store.get("key1").is_none());
        assert_eq!(store.stats().keys, 0);
    }

    #[test]
    fn test_store_overwrite() {
        let store = store();

        store.set("key1", &"value1".to_string(), None);
        store.set("key1", &"value2".to_string(), None);

        assert_eq!(store.get("key1").as_deref(), Some("value2"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().keys, 1);
    }

    #[test]
    fn test_store_lazy_expiration_without_runtime() {
        let store = store();

        store.set("key1", &"value1".to_string(), Some(Duration::from_millis(50)));
        assert_eq!(store.pending_timers(), 0);
        assert!(store.has("key1"));

        sleep(Duration::from_millis(80));

        // Still physically present until touched
        assert_eq!(store.len(), 1);
        assert!(store.get("key1").is_none());
        assert!(!store.has("key1"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_store_has_does_not_count() {
        let store = store();
        store.set("a", &"1".to_string(), None);

        assert!(store.has("a"));
        assert!(!store.has("b"));

        let stats = store.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_store_default_ttl_applies() {
        let store: CacheStore<String> = CacheStore::new(
            NamespaceConfig::new("short").with_default_ttl(Duration::from_millis(30)),
        );
        store.set("a", &"1".to_string(), None);
        store.set("b", &"2".to_string(), Some(Duration::from_secs(60)));

        sleep(Duration::from_millis(50));

        assert!(!store.has("a"));
        assert!(store.has("b"));
    }

    #[test]
    fn test_store_zero_ttl_expires_immediately() {
        let store = store();
        store.set("gone", &"v".to_string(), Some(Duration::ZERO));
        assert!(store.get("gone").is_none());
    }

    #[test]
    fn test_store_ttl_lookup() {
        let store = store();
        store.set("forever", &"v".to_string(), None);
        store.set("soon", &"v".to_string(), Some(Duration::from_secs(30)));

        assert_eq!(store.ttl("forever"), Some(None));
        let remaining = store.ttl("soon").flatten().unwrap();
        assert!(remaining <= Duration::from_secs(30));
        assert!(remaining > Duration::from_secs(29));
        assert_eq!(store.ttl("missing"), None);
    }

    #[test]
    fn test_store_keys_prunes_expired() {
        let store = store();
        store.set("live", &"v".to_string(), None);
        store.set("stale", &"v".to_string(), Some(Duration::from_millis(20)));

        sleep(Duration::from_millis(40));

        assert_eq!(store.keys(), vec!["live".to_string()]);
        assert_eq!(store.stats().keys, 1);
    }

    #[test]
    fn test_store_mget_partial() {
        let store: CacheStore<i64> = CacheStore::new(NamespaceConfig::new("nums"));
        assert!(store.mset([("a", &1), ("b", &2)], None));

        let found = store.mget(&["a", "b", "c"]);
        assert_eq!(found.len(), 2);
        assert_eq!(found["a"], 1);
        assert_eq!(found["b"], 2);
        assert!(!found.contains_key("c"));

        let stats = store.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_store_del_many() {
        let store = store();
        store.set("a", &"1".to_string(), None);
        store.set("b", &"2".to_string(), None);

        assert_eq!(store.del_many(&["a", "b", "c"]), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_flush_keeps_counters() {
        let store = store();
        store.set("a", &"1".to_string(), None);
        store.get("a");
        store.get("b");

        store.flush_all();

        let stats = store.stats();
        assert_eq!(stats.keys, 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_store_sweep() {
        let store = store();

        store.set("key1", &"value1".to_string(), Some(Duration::from_millis(20)));
        store.set("key2", &"value2".to_string(), Some(Duration::from_secs(10)));

        sleep(Duration::from_millis(40));

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.sweep(), 0);
        assert_eq!(store.len(), 1);
        assert!(store.get("key2").is_some());
    }

    #[test]
    fn test_store_events() {
        let (store, events) = recording_store();

        store.set("a", &"1".to_string(), None);
        store.set("b", &"2".to_string(), Some(Duration::ZERO));
        store.del("a");
        store.get("b");
        store.flush_all();

        let ns = || "test".to_string();
        assert_eq!(
            *events.lock(),
            vec![
                CacheEvent::Set { namespace: ns(), key: "a".to_string() },
                CacheEvent::Set { namespace: ns(), key: "b".to_string() },
                CacheEvent::Delete { namespace: ns(), key: "a".to_string() },
                CacheEvent::Expire { namespace: ns(), key: "b".to_string() },
                CacheEvent::Flush { namespace: ns() },
            ]
        );
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        tags: Vec<String>,
    }

    #[test]
    fn test_store_returns_independent_copies() {
        let store: CacheStore<Profile> = CacheStore::new(NamespaceConfig::new("profiles"));
        let original = Profile {
            name: "ada".to_string(),
            tags: vec!["admin".to_string()],
        };
        store.set("ada", &original, None);

        let mut read = store.get("ada").unwrap();
        read.tags.push("mutated".to_string());

        assert_eq!(store.get("ada").unwrap(), original);
    }

    /// Serializes fine but refuses to deserialize.
    #[derive(Clone, Debug)]
    struct OneWay;

    impl Serialize for OneWay {
        fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
            s.serialize_unit()
        }
    }

    impl<'de> Deserialize<'de> for OneWay {
        fn deserialize<D: serde::Deserializer<'de>>(_: D) -> std::result::Result<Self, D::Error> {
            Err(serde::de::Error::custom("one way only"))
        }
    }

    #[test]
    fn test_store_copy_failure_is_soft() {
        let copying: CacheStore<OneWay> = CacheStore::new(NamespaceConfig::new("strict"));
        assert!(!copying.set("k", &OneWay, None));
        assert!(copying.is_empty());

        let shared: CacheStore<OneWay> =
            CacheStore::new(NamespaceConfig::new("shared").without_copies());
        assert!(shared.set("k", &OneWay, None));
        assert!(shared.get("k").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_expires_key() {
        let store = store();
        store.set("k", &"v".to_string(), Some(Duration::from_secs(1)));
        assert_eq!(store.pending_timers(), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.get("k").as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(700)).await;
        // Removed by the timer, not by a read
        assert_eq!(store.len(), 0);
        assert_eq!(store.pending_timers(), 0);
        assert!(!store.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_replaces_timer() {
        let store = store();
        store.set("k", &"v1".to_string(), Some(Duration::from_secs(5)));
        store.set("k", &"v2".to_string(), Some(Duration::from_secs(1)));
        assert_eq!(store.pending_timers(), 1);

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(store.len(), 0);

        store.set("k", &"v3".to_string(), Some(Duration::from_secs(5)));
        store.set("k", &"v4".to_string(), None);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.get("k").as_deref(), Some("v4"));
        assert_eq!(store.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_cancels_timer() {
        let (store, events) = recording_store();
        store.set("k", &"v".to_string(), Some(Duration::from_secs(1)));
        store.del("k");
        assert_eq!(store.pending_timers(), 0);

        // Re-set without TTL: the cancelled timer must not remove it
        store.set("k", &"again".to_string(), None);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(store.get("k").as_deref(), Some("again"));
        assert!(!events
            .lock()
            .iter()
            .any(|event| matches!(event, CacheEvent::Expire { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_cancels_timers() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let hook: EventHook = Arc::new(move |event: &CacheEvent| {
            if matches!(event, CacheEvent::Expire { .. }) {
                flag.store(true, Ordering::SeqCst);
            }
        });
        let store: CacheStore<String> = CacheStore::with_hook(NamespaceConfig::new("t"), hook);

        store.set("a", &"1".to_string(), Some(Duration::from_secs(1)));
        store.set("b", &"2".to_string(), Some(Duration::from_secs(2)));
        store.flush_all();
        assert_eq!(store.pending_timers(), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_is_noop() {
        let store = store();
        store.set("k", &"v".to_string(), Some(Duration::from_secs(1)));

        // Simulate a timer that woke up after being replaced
        store.inner.fire_timer("k", 999);
        assert_eq!(store.len(), 1);
        assert_eq!(store.pending_timers(), 1);
    }
}

//! Cache Registry
//!
//! Namespace-qualified façade over a fixed set of [`CacheStore`]s. Every
//! operation is fail-soft: an unknown namespace or a serialization fault is
//! counted in the global `errors` counter, logged, and reported to the
//! caller as a cache miss (`None`, `false`, `0` or an empty map).

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{
    tracing_hook, CacheEvent, CacheStats, CacheStore, EventHook, GlobalCounters, GlobalStats,
    KeyPattern,
};
use crate::config::{Config, NamespaceConfig};
use crate::error::CacheError;
use crate::tasks::spawn_sweeper;

/// Statistics across every namespace, as served by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    #[serde(flatten)]
    pub global: GlobalStats,
    /// Global hit rate in percent
    pub hit_rate: f64,
    pub namespaces: BTreeMap<String, CacheStats>,
}

/// Owns the closed set of namespaces for the lifetime of the process.
pub struct CacheRegistry {
    stores: HashMap<String, CacheStore<Value>>,
    counters: GlobalCounters,
    hook: Option<EventHook>,
    sweepers: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheRegistry {
    /// Creates a registry whose events are logged through `tracing`.
    pub fn new(namespaces: Vec<NamespaceConfig>) -> Self {
        Self::build(namespaces, Some(tracing_hook()))
    }

    /// Creates a registry reporting every namespace's events to `hook`.
    pub fn with_hook(namespaces: Vec<NamespaceConfig>, hook: EventHook) -> Self {
        Self::build(namespaces, Some(hook))
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.namespaces.clone())
    }

    fn build(namespaces: Vec<NamespaceConfig>, hook: Option<EventHook>) -> Self {
        let mut stores = HashMap::with_capacity(namespaces.len());
        for config in namespaces {
            if stores.contains_key(&config.name) {
                warn!("Duplicate cache namespace '{}' ignored", config.name);
                continue;
            }
            let name = config.name.clone();
            let store = match &hook {
                Some(hook) => CacheStore::with_hook(config, hook.clone()),
                None => CacheStore::new(config),
            };
            stores.insert(name, store);
        }

        Self {
            stores,
            counters: GlobalCounters::new(),
            hook,
            sweepers: Mutex::new(Vec::new()),
        }
    }

    // == Lifecycle ==
    /// Starts one sweeper per namespace with a non-zero sweep interval.
    ///
    /// Must be called from within a tokio runtime. Returns the number of
    /// sweepers started; calling it again does not start duplicates.
    pub fn start_sweepers(&self) -> usize {
        let mut sweepers = self.sweepers.lock();
        if !sweepers.is_empty() {
            return 0;
        }
        sweepers.extend(
            self.stores
                .values()
                .filter_map(|store| spawn_sweeper(store.clone(), store.config().sweep_interval)),
        );
        sweepers.len()
    }

    /// Stops the sweepers and flushes every namespace, cancelling all timers.
    pub fn shutdown(&self) {
        for handle in self.sweepers.lock().drain(..) {
            handle.abort();
        }
        self.flush_all();
        info!("Cache registry shut down");
    }

    // == Namespaces ==
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.stores.contains_key(namespace)
    }

    /// Configured namespace names, sorted.
    pub fn namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // == Reads ==
    /// Returns the value under `key`, deserialized as `T`.
    ///
    /// A value that does not decode as `T` is reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        let decoded = self
            .resolve(namespace)?
            .get(key)
            .and_then(|value| self.decode(namespace, value));

        match decoded {
            Some(_) => self.counters.add_hits(1),
            None => self.counters.add_misses(1),
        }
        decoded
    }

    /// Returns the present keys among `keys`; missing keys are omitted.
    pub fn mget<T, K>(&self, namespace: &str, keys: &[K]) -> HashMap<String, T>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        let Some(store) = self.resolve(namespace) else {
            return HashMap::new();
        };

        let decoded: HashMap<String, T> = store
            .mget(keys)
            .into_iter()
            .filter_map(|(key, value)| Some((key, self.decode(namespace, value)?)))
            .collect();

        self.counters.add_hits(decoded.len() as u64);
        self.counters
            .add_misses(keys.len().saturating_sub(decoded.len()) as u64);
        decoded
    }

    /// Returns true when `key` holds an unexpired value. Not counted as a hit or miss.
    pub fn has(&self, namespace: &str, key: &str) -> bool {
        self.resolve(namespace).is_some_and(|store| store.has(key))
    }

    /// Remaining TTL of `key`; see [`CacheStore::ttl`].
    pub fn ttl(&self, namespace: &str, key: &str) -> Option<Option<Duration>> {
        self.resolve(namespace)?.ttl(key)
    }

    pub fn keys(&self, namespace: &str) -> Vec<String> {
        self.resolve(namespace)
            .map(CacheStore::keys)
            .unwrap_or_default()
    }

    // == Writes ==
    /// Stores `value` under `key`. Returns false on an unknown namespace or
    /// when the value cannot be serialized.
    pub fn set<T>(&self, namespace: &str, key: &str, value: &T, ttl: Option<Duration>) -> bool
    where
        T: Serialize + ?Sized,
    {
        let Some(store) = self.resolve(namespace) else {
            return false;
        };
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                self.fault(namespace, err.into());
                return false;
            }
        };

        self.counters.add_sets(1);
        let stored = store.set(key, &value, ttl);
        if !stored {
            self.counters.record_error();
        }
        stored
    }

    /// Stores every pair with the same TTL. Returns false if any pair failed.
    pub fn mset<'a, T, K, I>(&self, namespace: &str, entries: I, ttl: Option<Duration>) -> bool
    where
        T: Serialize + 'a,
        K: AsRef<str>,
        I: IntoIterator<Item = (K, &'a T)>,
    {
        if self.resolve(namespace).is_none() {
            return false;
        }
        entries.into_iter().fold(true, |ok, (key, value)| {
            self.set(namespace, key.as_ref(), value, ttl) && ok
        })
    }

    /// Deletes `key`, returning the number of entries removed (0 or 1).
    pub fn del(&self, namespace: &str, key: &str) -> usize {
        let Some(store) = self.resolve(namespace) else {
            return 0;
        };
        self.counters.add_deletes(1);
        store.del(key)
    }

    // == Bulk Operations ==
    /// Deletes every live key matching `pattern` and returns how many were removed.
    pub fn invalidate_pattern(&self, namespace: &str, pattern: impl Into<KeyPattern>) -> usize {
        let Some(store) = self.resolve(namespace) else {
            return 0;
        };
        let pattern = pattern.into();

        let removed: usize = store
            .keys()
            .iter()
            .filter(|key| pattern.matches(key))
            .map(|key| store.del(key))
            .sum();

        self.counters.add_deletes(removed as u64);
        info!(
            "Invalidated {} keys in '{}' matching {:?}",
            removed, namespace, pattern
        );
        removed
    }

    /// Like [`invalidate_pattern`](Self::invalidate_pattern) with a regular
    /// expression source. An invalid expression matches nothing.
    pub fn invalidate_regex(&self, namespace: &str, pattern: &str) -> usize {
        match KeyPattern::regex(pattern) {
            Ok(pattern) => self.invalidate_pattern(namespace, pattern),
            Err(err) => {
                self.fault(namespace, err);
                0
            }
        }
    }

    /// Clears one namespace. Returns false if it does not exist.
    pub fn flush_namespace(&self, namespace: &str) -> bool {
        let Some(store) = self.resolve(namespace) else {
            return false;
        };
        store.flush_all();
        info!("Flushed cache namespace '{}'", namespace);
        true
    }

    pub fn flush_all(&self) {
        for store in self.stores.values() {
            store.flush_all();
        }
        info!("Flushed all {} cache namespaces", self.stores.len());
    }

    /// Builds a `prefix:part:part` key; see [`generate_key`](crate::cache::generate_key).
    pub fn generate_key<I>(prefix: &str, parts: I) -> String
    where
        I: IntoIterator,
        I::Item: std::fmt::Display,
    {
        crate::cache::generate_key(prefix, parts)
    }

    // == Stats ==
    pub fn get_stats(&self) -> RegistryStats {
        let global = self.counters.snapshot();
        RegistryStats {
            hit_rate: global.hit_rate(),
            global,
            namespaces: self
                .stores
                .iter()
                .map(|(name, store)| (name.clone(), store.stats()))
                .collect(),
        }
    }

    fn decode<T: DeserializeOwned>(&self, namespace: &str, value: Value) -> Option<T> {
        serde_json::from_value(value)
            .map_err(|err| self.fault(namespace, err.into()))
            .ok()
    }

    fn resolve(&self, namespace: &str) -> Option<&CacheStore<Value>> {
        let store = self.stores.get(namespace);
        if store.is_none() {
            self.fault(namespace, CacheError::NamespaceNotFound(namespace.to_string()));
        }
        store
    }

    fn fault(&self, namespace: &str, err: CacheError) {
        self.counters.record_error();
        match &self.hook {
            Some(hook) => hook(&CacheEvent::Error {
                namespace: namespace.to_string(),
                message: err.to_string(),
            }),
            None => warn!("cache {}: {}", namespace, err),
        }
    }
}

impl Drop for CacheRegistry {
    fn drop(&mut self) {
        for handle in self.sweepers.get_mut().drain(..) {
            handle.abort();
        }
    }
}

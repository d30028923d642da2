//! Configuration Module
//!
//! Handles loading server and per-namespace cache configuration from
//! environment variables.

use std::env;
use std::time::Duration;

/// Namespaces created when `CACHE_NAMESPACES` is unset, with their TTLs in seconds.
const BUILTIN_NAMESPACES: &[(&str, u64)] = &[
    ("users", 600),
    ("dashboard", 300),
    ("sessions", 1800),
    ("leaderboard", 120),
    ("api", 60),
];

/// Configuration of a single cache namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Namespace name, used to route registry operations
    pub name: String,
    /// TTL applied when a caller omits one; `None` means entries never expire
    pub default_ttl: Option<Duration>,
    /// Interval between active sweeps; zero disables the sweeper
    pub sweep_interval: Duration,
    /// Deep-copy values through their serialized form on read and write
    pub copy_values: bool,
}

impl NamespaceConfig {
    /// Creates a namespace with no default TTL, a 60 second sweep and value copies on.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_ttl: None,
            sweep_interval: Duration::from_secs(60),
            copy_values: true,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Opt out of deep copies for values that are never mutated after insertion.
    pub fn without_copies(mut self) -> Self {
        self.copy_values = false;
        self
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// The closed set of cache namespaces
    pub namespaces: Vec<NamespaceConfig>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_NAMESPACES` - Comma separated namespace names
    ///   (default: users,dashboard,sessions,leaderboard,api)
    /// - `DEFAULT_TTL` - TTL in seconds for namespaces without a built-in one,
    ///   0 disables it (default: 300)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds, 0 disables (default: 60)
    /// - `COPY_VALUES` - Deep-copy cached values (default: true)
    /// - `<NAME>_CACHE_TTL` - Per-namespace TTL override in seconds
    pub fn from_env() -> Self {
        let default_ttl: u64 = parse_var("DEFAULT_TTL").unwrap_or(300);
        let sweep_interval: u64 = parse_var("SWEEP_INTERVAL").unwrap_or(60);
        let copy_values: bool = parse_var("COPY_VALUES").unwrap_or(true);

        let names: Vec<String> = match env::var("CACHE_NAMESPACES") {
            Ok(list) => list
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            Err(_) => BUILTIN_NAMESPACES
                .iter()
                .map(|(name, _)| name.to_string())
                .collect(),
        };

        let mut namespaces: Vec<NamespaceConfig> = Vec::with_capacity(names.len());
        for name in names {
            if namespaces.iter().any(|ns| ns.name == name) {
                continue;
            }
            let ttl = parse_var(&format!("{}_CACHE_TTL", name.to_uppercase()))
                .or_else(|| builtin_ttl(&name))
                .unwrap_or(default_ttl);
            namespaces.push(NamespaceConfig {
                default_ttl: (ttl > 0).then(|| Duration::from_secs(ttl)),
                sweep_interval: Duration::from_secs(sweep_interval),
                copy_values,
                name,
            });
        }

        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(3000),
            namespaces,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            namespaces: BUILTIN_NAMESPACES
                .iter()
                .map(|(name, ttl)| {
                    NamespaceConfig::new(*name).with_default_ttl(Duration::from_secs(*ttl))
                })
                .collect(),
        }
    }
}

fn builtin_ttl(name: &str) -> Option<u64> {
    BUILTIN_NAMESPACES
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, ttl)| *ttl)
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

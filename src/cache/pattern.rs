//! Key matching for bulk invalidation.

use regex::Regex;

use crate::error::{CacheError, Result};

/// Selects keys by substring or regular expression.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Matches keys containing the string
    Literal(String),
    /// Matches keys the expression finds a match in
    Regex(Regex),
}

impl KeyPattern {
    pub fn literal(pattern: impl Into<String>) -> Self {
        KeyPattern::Literal(pattern.into())
    }

    /// Compiles `pattern` as a regular expression.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(KeyPattern::Regex)
            .map_err(|err| CacheError::InvalidPattern(err.to_string()))
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Literal(needle) => key.contains(needle.as_str()),
            KeyPattern::Regex(re) => re.is_match(key),
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(pattern: &str) -> Self {
        KeyPattern::literal(pattern)
    }
}

impl From<String> for KeyPattern {
    fn from(pattern: String) -> Self {
        KeyPattern::Literal(pattern)
    }
}

impl From<Regex> for KeyPattern {
    fn from(re: Regex) -> Self {
        KeyPattern::Regex(re)
    }
}

/// Builds a colon-joined cache key, e.g. `generate_key("dashboard", [42])` is `"dashboard:42"`.
pub fn generate_key<I>(prefix: &str, parts: I) -> String
where
    I: IntoIterator,
    I::Item: std::fmt::Display,
{
    let mut key = prefix.to_string();
    for part in parts {
        key.push(':');
        key.push_str(&part.to_string());
    }
    key
}

//! Configuration port.
//!
//! A [`ConfigSource`] answers key lookups. The core only uses it to seed a
//! component's [`Environment`](crate::Environment) at construction time; after
//! that the environment is an opaque immutable map.

use std::collections::BTreeMap;

/// Key/value lookup used to seed environments.
pub trait ConfigSource: Send + Sync {
    /// Look up a single key.
    fn get(&self, key: &str) -> Option<String>;

    /// All keys this source can answer, in a stable order.
    fn keys(&self) -> Vec<String>;
}

/// An in-memory configuration source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapSource {
    values: BTreeMap<String, String>,
}

impl MapSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key, returning the updated source.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl<K, V> FromIterator<(K, V)> for MapSource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Process environment variables sharing a prefix.
///
/// Keys are reported with the prefix stripped, so `LOOM_REGION=eu` under
/// prefix `LOOM_` is visible as `REGION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    /// Read variables starting with `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The prefix filtered on.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{key}", self.prefix)).ok()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = std::env::vars_os()
            .filter_map(|(k, _)| k.into_string().ok())
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .filter(|k| !k.is_empty())
            .collect();
        keys.sort();
        keys
    }
}

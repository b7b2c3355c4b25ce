//! Immutable environment captured at component construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigSource;

/// An immutable key/value map.
///
/// Once built, an environment is never mutated; components hand out shared
/// references to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment(BTreeMap<String, String>);

impl Environment {
    /// An environment with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an environment from key/value pairs. Later duplicates win.
    #[must_use]
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Snapshot every key a configuration source exposes.
    #[must_use]
    pub fn capture(source: &dyn ConfigSource) -> Self {
        Self(
            source
                .keys()
                .into_iter()
                .filter_map(|key| source.get(&key).map(|value| (key, value)))
                .collect(),
        )
    }

    /// Snapshot only the listed keys; missing keys are skipped.
    #[must_use]
    pub fn capture_keys(source: &dyn ConfigSource, keys: &[&str]) -> Self {
        Self(
            keys.iter()
                .filter_map(|key| source.get(key).map(|value| ((*key).to_string(), value)))
                .collect(),
        )
    }

    /// Look up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the environment has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

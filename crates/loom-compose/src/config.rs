//! Machine configuration.

use std::time::Duration;

use loom_core::{ConfigSource, CoreError};
use serde::Deserialize;

/// Tunables for machine orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MachineConfig {
    /// How long a graceful stop waits for in-flight link deliveries, in
    /// milliseconds.
    #[serde(default = "MachineConfig::default_drain_timeout")]
    pub drain_timeout_ms: u64,
}

impl MachineConfig {
    /// Key read by [`from_source`](Self::from_source).
    pub const DRAIN_TIMEOUT_KEY: &'static str = "drain_timeout_ms";

    const fn default_drain_timeout() -> u64 {
        5_000
    }

    /// Read overrides from a configuration source, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if a value does not parse.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, CoreError> {
        let mut config = Self::default();
        if let Some(raw) = source.get(Self::DRAIN_TIMEOUT_KEY) {
            config.drain_timeout_ms = raw.trim().parse().map_err(|_| {
                CoreError::validation(Self::DRAIN_TIMEOUT_KEY, format!("not a number: {raw:?}"))
            })?;
        }
        Ok(config)
    }

    /// Get the drain timeout as a `Duration`.
    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: Self::default_drain_timeout(),
        }
    }
}

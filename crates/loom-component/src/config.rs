//! Component lifecycle configuration.

use loom_core::{ConfigSource, CoreError};
use serde::Deserialize;

/// Tunables for component lifecycle bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LifecycleConfig {
    /// Maximum transition records kept per component. Oldest are evicted.
    #[serde(default = "LifecycleConfig::default_transition_log_capacity")]
    pub transition_log_capacity: usize,
}

impl LifecycleConfig {
    /// Key read by [`from_source`](Self::from_source).
    pub const TRANSITION_LOG_CAPACITY_KEY: &'static str = "transition_log_capacity";

    const fn default_transition_log_capacity() -> usize {
        1024
    }

    /// Read overrides from a configuration source, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if a value does not parse or the
    /// capacity is zero.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, CoreError> {
        let mut config = Self::default();
        if let Some(raw) = source.get(Self::TRANSITION_LOG_CAPACITY_KEY) {
            config.transition_log_capacity = raw.trim().parse().map_err(|_| {
                CoreError::validation(
                    Self::TRANSITION_LOG_CAPACITY_KEY,
                    format!("not a number: {raw:?}"),
                )
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the values are usable.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the capacity is zero.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.transition_log_capacity == 0 {
            return Err(CoreError::validation(
                Self::TRANSITION_LOG_CAPACITY_KEY,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            transition_log_capacity: Self::default_transition_log_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::MapSource;

    #[test]
    fn default_config() {
        let config = LifecycleConfig::default();
        assert_eq!(config.transition_log_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserialize_uses_defaults() {
        let config: LifecycleConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LifecycleConfig::default());

        let config: LifecycleConfig =
            serde_json::from_str(r#"{"transition_log_capacity": 8}"#).unwrap();
        assert_eq!(config.transition_log_capacity, 8);
    }

    #[test]
    fn from_source_overrides() {
        let source = MapSource::new().with("transition_log_capacity", " 16 ");
        let config = LifecycleConfig::from_source(&source).unwrap();
        assert_eq!(config.transition_log_capacity, 16);

        let config = LifecycleConfig::from_source(&MapSource::new()).unwrap();
        assert_eq!(config.transition_log_capacity, 1024);
    }

    #[test]
    fn from_source_rejects_bad_values() {
        let source = MapSource::new().with("transition_log_capacity", "lots");
        assert!(LifecycleConfig::from_source(&source).is_err());

        let source = MapSource::new().with("transition_log_capacity", "0");
        assert!(LifecycleConfig::from_source(&source).is_err());
    }
}

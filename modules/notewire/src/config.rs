//! Dispatcher settings, with defaults overridable from the environment.

use std::env;
use std::time::Duration;

use crate::error::{NoteError, NoteResult};

const DEFAULT_LABEL: &str = "notewire";
const DEFAULT_SLOW_HANDLER_MS: u64 = 250;

/// Dispatcher settings, loadable from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Attached to every dispatch log line.
    pub label: String,
    /// Handlers slower than this are logged at warn level. `None` disables.
    pub slow_handler_threshold: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            slow_handler_threshold: Some(Duration::from_millis(DEFAULT_SLOW_HANDLER_MS)),
        }
    }
}

impl DispatcherConfig {
    /// Load from `NOTEWIRE_LABEL` and `NOTEWIRE_SLOW_HANDLER_MS` (`0` disables).
    pub fn from_env() -> NoteResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> NoteResult<Self> {
        let label = lookup("NOTEWIRE_LABEL").unwrap_or_else(|| DEFAULT_LABEL.to_string());

        let slow_ms = match lookup("NOTEWIRE_SLOW_HANDLER_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                NoteError::Config(format!("NOTEWIRE_SLOW_HANDLER_MS must be a number, got {raw:?}"))
            })?,
            None => DEFAULT_SLOW_HANDLER_MS,
        };

        Ok(Self {
            label,
            slow_handler_threshold: (slow_ms > 0).then(|| Duration::from_millis(slow_ms)),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_slow_handler_threshold(mut self, threshold: Option<Duration>) -> Self {
        self.slow_handler_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_vars_fall_back_to_defaults() {
        let config = DispatcherConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DispatcherConfig::default());
    }

    #[test]
    fn zero_threshold_disables_slow_warning() {
        let config = DispatcherConfig::from_lookup(lookup(&[
            ("NOTEWIRE_LABEL", "billing"),
            ("NOTEWIRE_SLOW_HANDLER_MS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.label, "billing");
        assert_eq!(config.slow_handler_threshold, None);
    }

    #[test]
    fn malformed_threshold_is_a_config_error() {
        let err = DispatcherConfig::from_lookup(lookup(&[("NOTEWIRE_SLOW_HANDLER_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, NoteError::Config(_)));
    }
}

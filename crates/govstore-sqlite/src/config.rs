//! Store configuration
//!
//! Read either from a deserialized config section or from the flat
//! string-keyed option map the control plane hands its storage plugins:
//!
//! | option            | value                          |
//! |-------------------|--------------------------------|
//! | `path`            | database file; absent = memory |
//! | `busy_timeout_ms` | integer milliseconds           |
//! | `offset_overflow` | `return_all` or `empty_page`   |

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use govstore_core::OffsetOverflow;
use serde::{Deserialize, Serialize};

use crate::bootstrap::SeedConfig;
use crate::error::{Result, SqliteError};

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file. `None` opens an in-memory store.
    pub path: Option<PathBuf>,
    /// How long a writer waits for the file lock before failing busy
    pub busy_timeout_ms: u64,
    pub offset_overflow: OffsetOverflow,
    pub seed: SeedConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            offset_overflow: OffsetOverflow::default(),
            seed: SeedConfig::default(),
        }
    }
}

impl StoreConfig {
    /// File-backed config with defaults for everything else.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Build from a flat option map. Unknown options are ignored.
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = options.get("path").filter(|p| !p.is_empty()) {
            config.path = Some(PathBuf::from(path));
        }
        if let Some(timeout) = options.get("busy_timeout_ms") {
            config.busy_timeout_ms = timeout.parse().map_err(|_| {
                SqliteError::Config(format!("busy_timeout_ms: `{}` is not an integer", timeout))
            })?;
        }
        if let Some(policy) = options.get("offset_overflow") {
            config.offset_overflow = policy
                .parse()
                .map_err(|e| SqliteError::Config(format!("offset_overflow: {}", e)))?;
        }
        Ok(config)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::from_options(&HashMap::new()).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert!(config.path.is_none());
    }

    #[test]
    fn test_from_options() {
        let config = StoreConfig::from_options(&options(&[
            ("path", "/var/lib/gov/store.db"),
            ("busy_timeout_ms", "250"),
            ("offset_overflow", "empty_page"),
        ]))
        .unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/var/lib/gov/store.db")));
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.offset_overflow, OffsetOverflow::EmptyPage);
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        let err = StoreConfig::from_options(&options(&[("busy_timeout_ms", "soon")])).unwrap_err();
        assert!(matches!(err, SqliteError::Config(_)));

        let err = StoreConfig::from_options(&options(&[("offset_overflow", "wrap")])).unwrap_err();
        assert!(matches!(err, SqliteError::Config(_)));
    }

    #[test]
    fn test_deserialize_partial_section() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"offset_overflow": "empty_page"}"#).unwrap();
        assert_eq!(config.offset_overflow, OffsetOverflow::EmptyPage);
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }
}

//! Configuration for the catalog engine

use crate::services::CatalogError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Hard upper bound on retained undo snapshots
/// Each snapshot is a full copy of the store, so memory grows linearly
const MAX_HISTORY_LIMIT: usize = 1000;

/// Tunables for the editor, import pipeline, and save scheduler.
///
/// All fields use `#[serde(default)]` so partial config files deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    /// Number of undo snapshots kept before the oldest is trimmed
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Quiet period before a pending save is issued
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Imports with more nodes than this produce a "large import" warning
    #[serde(default = "default_large_import_threshold")]
    pub large_import_threshold: usize,

    /// Name given to nodes created by add operations
    #[serde(default = "default_node_name")]
    pub default_node_name: String,
}

fn default_history_limit() -> usize {
    50
}

fn default_save_debounce_ms() -> u64 {
    750
}

fn default_large_import_threshold() -> usize {
    500
}

fn default_node_name() -> String {
    "New Node".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            save_debounce_ms: default_save_debounce_ms(),
            large_import_threshold: default_large_import_threshold(),
            default_node_name: default_node_name(),
        }
    }
}

impl CatalogConfig {
    /// Load from a JSON file, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate().map_err(CatalogError::invalid_config)?;
        Ok(config)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.history_limit == 0 {
            return Err("history_limit must be greater than 0".to_string());
        }

        if self.history_limit > MAX_HISTORY_LIMIT {
            return Err(format!(
                "history_limit cannot exceed {} (each entry is a full catalog snapshot)",
                MAX_HISTORY_LIMIT
            ));
        }

        if self.default_node_name.trim().is_empty() {
            return Err("default_node_name cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = CatalogConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.large_import_threshold, 500);
    }

    #[test]
    fn test_validation_rejects_zero_history() {
        let config = CatalogConfig {
            history_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_oversized_history() {
        let config = CatalogConfig {
            history_limit: MAX_HISTORY_LIMIT + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = CatalogConfig::load(&temp_dir.path().join("absent.json")).unwrap();
        assert_eq!(config, CatalogConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        std::fs::write(&path, r#"{"historyLimit": 5}"#).unwrap();

        let config = CatalogConfig::load(&path).unwrap();
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.default_node_name, "New Node");
    }

    #[test]
    fn test_load_invalid_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        std::fs::write(&path, r#"{"defaultNodeName": ""}"#).unwrap();

        let result = CatalogConfig::load(&path);
        assert!(matches!(result, Err(CatalogError::InvalidConfig(_))));
    }
}

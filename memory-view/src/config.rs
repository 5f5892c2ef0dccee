// Persisted memory view settings

use crate::error::Result;
use crate::model::TrackingType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryViewConfig {
    /// Classes to track as soon as a session starts
    pub tracked_classes: BTreeMap<String, TrackingType>,
    pub show_with_diff_only: bool,
    pub show_with_instances_only: bool,
}

impl MemoryViewConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::from_json_str(&text)?;
                info!(
                    "Loaded {} tracked classes from {}",
                    config.tracked_classes.len(),
                    path.display()
                );
                Ok(config)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryViewError;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = MemoryViewConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, MemoryViewConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory-view.json");

        let mut config = MemoryViewConfig {
            show_with_diff_only: true,
            ..Default::default()
        };
        config
            .tracked_classes
            .insert("com.example.Foo".to_string(), TrackingType::CreationTracked);
        config.save(&path).unwrap();

        assert_eq!(MemoryViewConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = MemoryViewConfig::from_json_str(
            r#"{"tracked_classes": {"a.B": "diff_tracked"}}"#,
        )
        .unwrap();
        assert_eq!(config.tracked_classes["a.B"], TrackingType::DiffTracked);
        assert!(!config.show_with_instances_only);
    }

    #[test]
    fn test_malformed_json_is_format_error() {
        let err = MemoryViewConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, MemoryViewError::ConfigFormat(_)));
    }
}

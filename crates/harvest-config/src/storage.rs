//! Local storage locations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory for the persisted session and the local backend's data files.
    /// Empty means `~/.harvest`.
    #[serde(default)]
    pub data_dir: String,
}

impl StorageConfig {
    /// Resolve the data directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if no directory is configured and the
    /// home directory cannot be determined.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if !self.data_dir.is_empty() {
            return Ok(PathBuf::from(&self.data_dir));
        }
        dirs::home_dir()
            .map(|home| home.join(".harvest"))
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "storage.data_dir".into(),
                reason: "not set and home directory not found".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_is_used_verbatim() {
        let config = StorageConfig {
            data_dir: "/tmp/harvest-test".into(),
        };
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/harvest-test"));
    }

    #[test]
    fn default_dir_is_under_home() {
        let dir = StorageConfig::default().data_dir().expect("home should resolve");
        assert!(dir.ends_with(".harvest"));
    }
}

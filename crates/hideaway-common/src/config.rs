//! Tunables for filesystem preparation and executable lookup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{HideawayError, Result};

/// Root configuration for the shim.
///
/// Every field has a default, so a partial JSON document is enough to
/// override a single value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Search path used inside a root filesystem without a `PATH` override.
    pub default_root_path: String,
    /// Host directories bound read-only into every root filesystem.
    pub system_dirs: Vec<PathBuf>,
    /// Host files bound read-only into every root filesystem.
    pub system_files: Vec<PathBuf>,
    /// Permission bits for created target directories.
    pub dir_mode: u32,
    /// Permission bits for created target files.
    pub file_mode: u32,
    /// Reject destinations that climb out of the working directory.
    pub confine_destinations: bool,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            default_root_path: constants::DEFAULT_ROOT_PATH.to_string(),
            system_dirs: constants::SYSTEM_DIRS.iter().map(PathBuf::from).collect(),
            system_files: constants::SYSTEM_FILES.iter().map(PathBuf::from).collect(),
            dir_mode: constants::MOUNT_DIR_MODE,
            file_mode: constants::MOUNT_FILE_MODE,
            confine_destinations: true,
        }
    }
}

impl ShimConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails [`ShimConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| HideawayError::Filesystem {
            action: "read configuration",
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that modes fit in permission bits and that system targets are absolute.
    ///
    /// # Errors
    ///
    /// Returns [`HideawayError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        for (name, mode) in [("dir_mode", self.dir_mode), ("file_mode", self.file_mode)] {
            if mode > 0o7777 {
                return Err(HideawayError::Config {
                    message: format!("{name} {mode:#o} is not a permission mode"),
                });
            }
        }
        if let Some(p) = self
            .system_dirs
            .iter()
            .chain(&self.system_files)
            .find(|p| !p.is_absolute())
        {
            return Err(HideawayError::Config {
                message: format!("system mount source must be absolute: {}", p.display()),
            });
        }
        Ok(())
    }
}

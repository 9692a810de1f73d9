//! Forge settings
//!
//! Stored as RON next to the managed virtual environment. Every field has a
//! default, so a missing file or a partial one both work.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default settings file name.
pub const CONFIG_FILE: &str = "forge.ron";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
}

/// Settings for bootstrapping and conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
    /// Virtual environment directory
    pub venv_dir: PathBuf,
    /// Interpreter used to create the virtual environment
    pub python: String,
    /// Pinned packages installed into the environment
    pub requirements: Vec<String>,
    /// Explicit PyInstaller path, skips discovery
    pub packager: Option<PathBuf>,
    /// Launcher script file name
    pub launcher_name: String,
    /// Write `requirements.txt` from `pip freeze` after installing
    pub freeze_requirements: bool,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            venv_dir: PathBuf::from("venv"),
            python: default_python().to_string(),
            requirements: vec!["PyQt5==5.15.9".to_string(), "pyinstaller==6.1.0".to_string()],
            packager: None,
            launcher_name: default_launcher_name().to_string(),
            freeze_requirements: true,
        }
    }
}

fn default_python() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}

fn default_launcher_name() -> &'static str {
    if cfg!(windows) {
        "launch_converter.bat"
    } else {
        "launch_converter.sh"
    }
}

impl ForgeConfig {
    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ron::from_str(&text)?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load from a file, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Saved config to {:?}", path);
        Ok(())
    }
}

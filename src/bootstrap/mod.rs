//! Environment bootstrapper
//!
//! Creates an isolated Python environment with the pinned packaging
//! dependencies and writes a launcher for the GUI.

mod launcher;
mod venv;

pub use launcher::{launcher_script, write_launcher};
pub use venv::VirtualEnv;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ForgeConfig;

/// Errors that stop the bootstrap.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Python interpreter `{0}` not found")]
    InterpreterNotFound(String),
    #[error("Virtual environment at {} was not created", .0.display())]
    VenvCreation(PathBuf),
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a finished bootstrap produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub venv: VirtualEnv,
    pub launcher: PathBuf,
    pub requirements_file: Option<PathBuf>,
}

/// Sets up the managed environment in a working directory.
pub struct Bootstrapper {
    root: PathBuf,
    config: ForgeConfig,
    front_end: PathBuf,
}

impl Bootstrapper {
    /// `front_end` is the executable the launcher starts, normally this binary.
    pub fn new(root: impl Into<PathBuf>, config: ForgeConfig, front_end: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config,
            front_end: front_end.into(),
        }
    }

    /// Rebuild the environment from scratch and write the launcher.
    pub fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        let python = which::which(&self.config.python)
            .map_err(|_| BootstrapError::InterpreterNotFound(self.config.python.clone()))?;

        let venv = VirtualEnv::new(self.root.join(&self.config.venv_dir));

        if venv.root.exists() {
            log::info!("Removing existing virtual environment at {:?}", venv.root);
            remove_dir(&venv.root)?;
        }

        log::info!("Creating virtual environment at {:?}", venv.root);
        venv.create(&python)?;

        log::info!("Upgrading pip");
        venv.pip(&["install", "--upgrade", "pip"])?;

        for requirement in &self.config.requirements {
            log::info!("Installing {}", requirement);
            venv.pip(&["install", "--no-cache-dir", requirement])?;
        }

        let requirements_file = if self.config.freeze_requirements {
            let output = venv.pip(&["freeze"])?;
            let path = self.root.join("requirements.txt");
            std::fs::write(&path, &output.stdout).map_err(|source| BootstrapError::Io {
                path: path.clone(),
                source,
            })?;
            Some(path)
        } else {
            None
        };

        let launcher = self.root.join(&self.config.launcher_name);
        write_launcher(&launcher, &launcher_script(&venv.root, &self.front_end))?;
        log::info!("Wrote launcher {:?}", launcher);

        Ok(BootstrapReport {
            venv,
            launcher,
            requirements_file,
        })
    }
}

fn remove_dir(path: &Path) -> Result<(), BootstrapError> {
    std::fs::remove_dir_all(path).map_err(|source| BootstrapError::Io {
        path: path.to_path_buf(),
        source,
    })
}

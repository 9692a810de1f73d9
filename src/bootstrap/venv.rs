//! Python virtual environment handling.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use super::BootstrapError;

/// A virtual environment directory and the paths inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    pub root: PathBuf,
}

impl VirtualEnv {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the environment's executables.
    pub fn scripts_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.root.join("Scripts")
        } else {
            self.root.join("bin")
        }
    }

    /// The environment's own interpreter.
    pub fn python(&self) -> PathBuf {
        self.scripts_dir().join(exe_name("python"))
    }

    /// PyInstaller entry point installed by pip.
    pub fn packager_path(&self) -> PathBuf {
        self.scripts_dir().join(exe_name("pyinstaller"))
    }

    pub fn exists(&self) -> bool {
        self.python().is_file()
    }

    /// Create the environment with `<python> -m venv`.
    pub fn create(&self, python: &Path) -> Result<(), BootstrapError> {
        let mut cmd = Command::new(python);
        cmd.args(["-m", "venv"]).arg(&self.root);
        run_checked(&mut cmd)?;

        if !self.exists() {
            return Err(BootstrapError::VenvCreation(self.root.clone()));
        }
        Ok(())
    }

    /// Run `python -m pip <args>` inside the environment.
    pub fn pip(&self, args: &[&str]) -> Result<Output, BootstrapError> {
        let mut cmd = Command::new(self.python());
        cmd.args(["-m", "pip"]).args(args);
        run_checked(&mut cmd)
    }
}

fn exe_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Run a command to completion, failing on a non-zero exit.
pub(crate) fn run_checked(cmd: &mut Command) -> Result<Output, BootstrapError> {
    let display = describe(cmd);
    log::debug!("Executing: {}", display);

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|source| BootstrapError::Spawn {
            command: display.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(BootstrapError::CommandFailed {
            command: display,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

fn describe(cmd: &Command) -> String {
    let mut text = cmd.get_program().to_string_lossy().to_string();
    for arg in cmd.get_args() {
        text.push(' ');
        text.push_str(&arg.to_string_lossy());
    }
    text
}

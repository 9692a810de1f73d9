//! PyInstaller wrapper for script conversion.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use super::formats::{executable_extension, PackagingMode};
use super::request::ConversionRequest;
use crate::bootstrap::VirtualEnv;
use crate::config::ForgeConfig;

/// Errors that can occur while running PyInstaller.
#[derive(Error, Debug)]
pub enum PackagerError {
    #[error("PyInstaller not found. Run `pyexe-forge setup` or set `packager` in forge.ron")]
    NotFound,
    #[error("Failed to spawn PyInstaller process: {0}")]
    SpawnFailed(#[source] io::Error),
    #[error("I/O error while running PyInstaller: {0}")]
    Io(#[from] io::Error),
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),
    #[error("Conversion completed but artifact not found at {}", .0.display())]
    ArtifactMissing(PathBuf),
    #[error("Invalid conversion request: {0}")]
    InvalidRequest(String),
}

/// Build the PyInstaller argument list for a request.
///
/// Pure: the same request always yields the same arguments.
pub fn packager_args(request: &ConversionRequest) -> Vec<OsString> {
    let output_dir = request.output_dir();
    let mut args: Vec<OsString> = vec!["--clean".into(), "--noconfirm".into()];

    args.push(request.mode().flag().into());

    if !request.console_visible() {
        args.push("--windowed".into());
    }

    args.push("--distpath".into());
    args.push(output_dir.as_os_str().to_owned());
    args.push("--workpath".into());
    args.push(workpath(output_dir).into_os_string());
    args.push("--specpath".into());
    args.push(output_dir.as_os_str().to_owned());
    args.push(request.script_path().as_os_str().to_owned());

    args
}

/// PyInstaller's scratch directory for a build into `output_dir`.
pub fn workpath(output_dir: &Path) -> PathBuf {
    output_dir.join("build")
}

/// The artifact would land on or inside the scratch directory.
///
/// Happens for a script named `build.py` on hosts without an executable
/// extension, and for any `--onedir` build of it. PyInstaller then fails or
/// overwrites its own work files.
pub fn workpath_collides(request: &ConversionRequest, extension: &str) -> bool {
    let work = workpath(request.output_dir());
    artifact_candidates(request, extension)
        .iter()
        .any(|path| path.starts_with(&work))
}

/// Where PyInstaller is expected to put the executable.
///
/// `extension` is the platform executable extension, empty for none.
pub fn expected_artifact_path(script: &Path, output_dir: &Path, extension: &str) -> PathBuf {
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());

    output_dir.join(executable_name(&stem, extension))
}

fn executable_name(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}

/// Paths checked for the artifact, in order.
///
/// `--onedir` builds put the executable inside `<out>/<name>/`, so that
/// location is tried after the flat one.
pub fn artifact_candidates(request: &ConversionRequest, extension: &str) -> Vec<PathBuf> {
    let flat = expected_artifact_path(request.script_path(), request.output_dir(), extension);
    let mut candidates = vec![flat];

    if request.mode() == PackagingMode::SingleDirectory {
        let stem = request.script_stem();
        candidates.push(
            request
                .output_dir()
                .join(&stem)
                .join(executable_name(&stem, extension)),
        );
    }

    candidates
}

/// A produced executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Find the artifact for a finished request and read its size.
pub fn locate_artifact(request: &ConversionRequest) -> Result<Artifact, PackagerError> {
    let mut candidates = artifact_candidates(request, executable_extension());

    for path in &candidates {
        if let Ok(metadata) = fs::metadata(path) {
            if metadata.is_file() {
                return Ok(Artifact {
                    path: path.clone(),
                    size_bytes: metadata.len(),
                });
            }
        }
    }

    Err(PackagerError::ArtifactMissing(candidates.swap_remove(0)))
}

/// Fully resolved command line for one PyInstaller run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl PackagerCommand {
    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Keep a console window from flashing up behind the GUI
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }
}

impl fmt::Display for PackagerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Handle on the PyInstaller binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packager {
    path: PathBuf,
}

impl Packager {
    /// Use a specific binary without checking that it exists.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Find PyInstaller: config override, then the managed venv, then PATH.
    pub fn locate(config: &ForgeConfig) -> Result<Self, PackagerError> {
        if let Some(path) = &config.packager {
            if path.is_file() {
                return Ok(Self::new(path));
            }
            log::warn!("Configured packager {:?} does not exist", path);
            return Err(PackagerError::NotFound);
        }

        let venv_tool = VirtualEnv::new(&config.venv_dir).packager_path();
        if venv_tool.is_file() {
            return Ok(Self::new(venv_tool));
        }

        if let Ok(path) = which::which("pyinstaller") {
            return Ok(Self::new(path));
        }

        Err(PackagerError::NotFound)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Command line for a request.
    pub fn command_for(&self, request: &ConversionRequest) -> PackagerCommand {
        PackagerCommand {
            program: self.path.clone(),
            args: packager_args(request),
        }
    }

    /// Start a PyInstaller process.
    pub fn spawn(&self, command: &PackagerCommand) -> Result<PackagerProcess, PackagerError> {
        let mut child = command
            .to_command()
            .spawn()
            .map_err(PackagerError::SpawnFailed)?;

        // Drain stderr on its own thread so a full pipe can't stall the child
        let stderr_drain = match child.stderr.take() {
            Some(mut stderr) => {
                let drain = thread::Builder::new()
                    .name("pyinstaller-stderr".to_string())
                    .spawn(move || {
                        let mut buf = Vec::new();
                        stderr
                            .read_to_end(&mut buf)
                            .map(|_| String::from_utf8_lossy(&buf).to_string())
                    });
                match drain {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        log::error!("Failed to start stderr reader: {}", e);
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(PackagerError::Io(e));
                    }
                }
            }
            None => None,
        };

        Ok(PackagerProcess {
            child,
            stderr_drain,
        })
    }
}

/// Exit status plus everything the process wrote to stderr.
#[derive(Debug)]
pub struct ProcessExit {
    pub status: ExitStatus,
    pub stderr: String,
}

/// Handle for a running PyInstaller process.
pub struct PackagerProcess {
    child: Child,
    stderr_drain: Option<JoinHandle<io::Result<String>>>,
}

impl PackagerProcess {
    /// Take the stdout pipe for line-by-line reading.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Wait for the process to exit and collect its stderr.
    pub fn wait(mut self) -> Result<ProcessExit, PackagerError> {
        let status = self.child.wait()?;
        let stderr = self.join_stderr()?;
        Ok(ProcessExit { status, stderr })
    }

    /// Kill the process and reap it.
    ///
    /// A process that already exited is only reaped.
    pub fn abort(mut self) -> Result<ProcessExit, PackagerError> {
        if let Err(e) = self.child.kill() {
            log::debug!("PyInstaller kill: {}", e);
        }
        // Dropping stdout lets a child blocked on a full pipe see EPIPE
        drop(self.child.stdout.take());
        self.wait()
    }

    fn join_stderr(&mut self) -> Result<String, PackagerError> {
        match self.stderr_drain.take() {
            Some(handle) => Ok(handle.join().unwrap_or_else(|_| Ok(String::new()))?),
            None => Ok(String::new()),
        }
    }
}

//! Conversion request and outcome definitions.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use super::formats::{is_supported_extension, PackagingMode};
use super::packager::PackagerError;

/// Immutable snapshot of everything one conversion needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    script_path: PathBuf,
    output_dir: PathBuf,
    mode: PackagingMode,
    console_visible: bool,
}

impl ConversionRequest {
    /// Create a request without touching the filesystem.
    ///
    /// Use [`RequestBuilder::build`] to get a validated one.
    pub fn new(
        script_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        mode: PackagingMode,
        console_visible: bool,
    ) -> Self {
        Self {
            script_path: script_path.into(),
            output_dir: output_dir.into(),
            mode,
            console_visible,
        }
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn mode(&self) -> PackagingMode {
        self.mode
    }

    pub fn console_visible(&self) -> bool {
        self.console_visible
    }

    /// Script file name without extension, used to name the artifact.
    pub fn script_stem(&self) -> String {
        self.script_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string())
    }

    /// Get the script file name.
    pub fn script_filename(&self) -> String {
        self.script_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Collects the user's selections until a conversion is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBuilder {
    /// Selected Python script
    pub script_path: Option<PathBuf>,
    /// Selected output directory
    pub output_dir: Option<PathBuf>,
    /// Selected packaging mode
    pub mode: PackagingMode,
    /// Whether the executable keeps a console window
    pub console_visible: bool,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            script_path: None,
            output_dir: None,
            mode: PackagingMode::default(),
            console_visible: true,
        }
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.script_path = Some(path.into());
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    pub fn mode(mut self, mode: PackagingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn console_visible(mut self, console_visible: bool) -> Self {
        self.console_visible = console_visible;
        self
    }

    /// Both a script and an output directory have been chosen.
    pub fn is_ready(&self) -> bool {
        self.script_path.is_some() && self.output_dir.is_some()
    }

    /// Validate the selections and snapshot them into a request.
    ///
    /// The script must be a readable file. The output directory is created
    /// if it does not exist yet.
    pub fn build(&self) -> Result<ConversionRequest, PackagerError> {
        let script_path = self
            .script_path
            .clone()
            .ok_or_else(|| PackagerError::InvalidRequest("no Python script selected".to_string()))?;
        let output_dir = self
            .output_dir
            .clone()
            .ok_or_else(|| PackagerError::InvalidRequest("no output directory selected".to_string()))?;

        if !script_path.is_file() {
            return Err(PackagerError::InvalidRequest(format!(
                "script {} does not exist",
                script_path.display()
            )));
        }
        let looks_like_python = script_path
            .extension()
            .and_then(|e| e.to_str())
            .map(is_supported_extension)
            .unwrap_or(false);
        if !looks_like_python {
            log::warn!("{:?} does not look like a Python script", script_path);
        }
        File::open(&script_path).map_err(|e| {
            PackagerError::InvalidRequest(format!(
                "script {} is not readable: {}",
                script_path.display(),
                e
            ))
        })?;

        if output_dir.exists() && !output_dir.is_dir() {
            return Err(PackagerError::InvalidRequest(format!(
                "output path {} is not a directory",
                output_dir.display()
            )));
        }
        fs::create_dir_all(&output_dir).map_err(|e| {
            PackagerError::InvalidRequest(format!(
                "cannot create output directory {}: {}",
                output_dir.display(),
                e
            ))
        })?;

        Ok(ConversionRequest::new(
            script_path,
            output_dir,
            self.mode,
            self.console_visible,
        ))
    }
}

/// Final result of one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub succeeded: bool,
    pub message: String,
    pub artifact_path: Option<PathBuf>,
    pub artifact_size_bytes: Option<u64>,
}

impl ConversionOutcome {
    pub fn success(artifact_path: PathBuf, artifact_size_bytes: u64) -> Self {
        let size_mb = artifact_size_bytes as f64 / (1024.0 * 1024.0);
        let message = format!(
            "Conversion completed successfully!\nExecutable location: {}\nSize: {:.2} MB",
            artifact_path.display(),
            size_mb
        );
        Self {
            succeeded: true,
            message,
            artifact_path: Some(artifact_path),
            artifact_size_bytes: Some(artifact_size_bytes),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
            artifact_path: None,
            artifact_size_bytes: None,
        }
    }
}

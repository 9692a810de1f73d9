//! Packaging modes and platform file conventions.

use serde::{Deserialize, Serialize};

/// How PyInstaller lays out the produced artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PackagingMode {
    /// Everything bundled into one self-extracting executable
    #[default]
    SingleFile,
    /// Executable plus its dependencies in one folder
    SingleDirectory,
}

impl PackagingMode {
    /// Returns the PyInstaller mode flag.
    pub fn flag(&self) -> &'static str {
        match self {
            PackagingMode::SingleFile => "--onefile",
            PackagingMode::SingleDirectory => "--onedir",
        }
    }

    /// Returns a human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            PackagingMode::SingleFile => "One File",
            PackagingMode::SingleDirectory => "One Directory",
        }
    }

    /// All available modes.
    pub fn all() -> &'static [PackagingMode] {
        &[PackagingMode::SingleFile, PackagingMode::SingleDirectory]
    }
}

/// Human-readable name for the console choice.
pub fn console_display_name(console_visible: bool) -> &'static str {
    if console_visible {
        "Console Based"
    } else {
        "Window Based"
    }
}

/// Extension PyInstaller gives executables on this platform ("exe" on Windows, empty elsewhere).
pub fn executable_extension() -> &'static str {
    std::env::consts::EXE_EXTENSION
}

/// Script extensions offered in the file picker.
pub fn supported_script_extensions() -> &'static [&'static str] {
    &["py", "pyw"]
}

/// Check if a file extension is a Python script.
pub fn is_supported_extension(ext: &str) -> bool {
    let ext_lower = ext.to_lowercase();
    supported_script_extensions().iter().any(|e| *e == ext_lower)
}

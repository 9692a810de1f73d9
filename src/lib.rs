//! PyExeForge Library
//!
//! Turns Python scripts into standalone executables by driving PyInstaller
//! from a managed virtual environment.

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod converter;

// Re-export commonly used types
pub use app::ForgeApp;
pub use bootstrap::{BootstrapError, Bootstrapper};
pub use config::ForgeConfig;
pub use converter::{
    ConversionOutcome, ConversionRequest, ConversionWorker, ConverterWindow, Packager,
    PackagingMode, RequestBuilder, WorkerEvent,
};

//! Python Script Converter Module
//!
//! Converts Python scripts to standalone executables using PyInstaller.

pub mod formats;
pub mod packager;
pub mod progress;
pub mod request;
pub mod worker;
mod window;

pub use formats::PackagingMode;
pub use packager::{Packager, PackagerError};
pub use request::{ConversionOutcome, ConversionRequest, RequestBuilder};
pub use window::ConverterWindow;
pub use worker::{ConversionWorker, WorkerEvent, WorkerHandle, WorkerState};

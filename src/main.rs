//! PyExeForge - Python to EXE Converter
//!
//! Main entry point for the application.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use pyexe_forge::config::{ForgeConfig, CONFIG_FILE};
use pyexe_forge::converter::{
    ConversionWorker, Packager, PackagingMode, RequestBuilder, WorkerEvent,
};
use pyexe_forge::Bootstrapper;

#[derive(Parser)]
#[command(name = "pyexe-forge", version, about = "Convert Python scripts into standalone executables")]
struct Cli {
    /// Settings file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the virtual environment, install pinned dependencies and write the launcher
    Setup,
    /// Open the converter window (default)
    Gui,
    /// Convert a script without the GUI
    Convert {
        /// Python script to convert
        script: PathBuf,
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
        /// Produce a folder instead of a single executable
        #[arg(long)]
        onedir: bool,
        /// Hide the console window of the produced executable
        #[arg(long)]
        windowed: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = ForgeConfig::load_or_default(&cli.config)?;

    log::info!("Starting PyExeForge v{}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Gui) {
        Commands::Setup => setup(config),
        Commands::Gui => pyexe_forge::app::run(config)
            .map_err(|e| anyhow::anyhow!("GUI failed: {}", e)),
        Commands::Convert {
            script,
            out,
            onedir,
            windowed,
        } => {
            let mode = if onedir {
                PackagingMode::SingleDirectory
            } else {
                PackagingMode::SingleFile
            };
            convert(config, script, out, mode, !windowed)
        }
    }
}

fn setup(config: ForgeConfig) -> anyhow::Result<()> {
    let root = std::env::current_dir().context("cannot determine working directory")?;
    let front_end = std::env::current_exe().context("cannot determine executable path")?;

    let report = Bootstrapper::new(root, config, front_end)
        .run()
        .context("Setup failed")?;

    println!("\nSetup completed successfully!");
    println!("\nTo start the converter, run: {}", report.launcher.display());
    Ok(())
}

fn convert(
    config: ForgeConfig,
    script: PathBuf,
    out: PathBuf,
    mode: PackagingMode,
    console_visible: bool,
) -> anyhow::Result<()> {
    let request = RequestBuilder::new()
        .script(script)
        .output_dir(out)
        .mode(mode)
        .console_visible(console_visible)
        .build()?;
    let packager = Packager::locate(&config)?;

    let mut handle = ConversionWorker::spawn(request, packager);
    while let Some(event) = handle.recv() {
        match event {
            WorkerEvent::LogLine(line) => println!("{}", line),
            WorkerEvent::Progress(percent) => log::info!("Progress: {}%", percent),
            WorkerEvent::State(state) => log::debug!("Worker state: {}", state.display()),
            WorkerEvent::Finished(outcome) => {
                if outcome.succeeded {
                    println!("{}", outcome.message);
                    return Ok(());
                }
                bail!(outcome.message);
            }
        }
    }

    bail!("Conversion worker stopped without reporting an outcome")
}

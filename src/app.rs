//! Main application state
//!
//! Hosts the converter panel inside an eframe window.

use crate::config::ForgeConfig;
use crate::converter::ConverterWindow;
use eframe::egui;

/// Main application state
pub struct ForgeApp {
    pub converter_window: ConverterWindow,
}

impl ForgeApp {
    /// Create a new application instance
    pub fn new(cc: &eframe::CreationContext<'_>, config: ForgeConfig) -> Self {
        log::info!("Initializing PyExeForge...");

        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        Self {
            converter_window: ConverterWindow::new(config),
        }
    }
}

impl eframe::App for ForgeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.converter_window.show(ctx);
    }
}

/// Open the converter window and block until it is closed.
pub fn run(config: ForgeConfig) -> eframe::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Python to EXE Converter"),
        vsync: true,
        ..Default::default()
    };

    eframe::run_native(
        "Python to EXE Converter",
        native_options,
        Box::new(move |cc| Box::new(ForgeApp::new(cc, config))),
    )
}

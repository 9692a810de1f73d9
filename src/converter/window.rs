//! Converter window UI.

use egui::{Color32, RichText, Vec2};

use super::formats::{console_display_name, supported_script_extensions, PackagingMode};
use super::packager::Packager;
use super::request::{ConversionOutcome, RequestBuilder};
use super::worker::{ConversionWorker, WorkerEvent, WorkerHandle, WorkerState};
use crate::config::ForgeConfig;

/// Message shown after a conversion ends or fails to start.
#[derive(Debug, Clone)]
struct ResultDialog {
    succeeded: bool,
    message: String,
}

/// Python to EXE converter panel.
pub struct ConverterWindow {
    /// Current selections
    builder: RequestBuilder,
    /// Settings used to find PyInstaller
    config: ForgeConfig,
    /// Running conversion, if any
    active: Option<WorkerHandle>,
    /// Last reported worker state
    state: WorkerState,
    /// Last reported progress (0-100)
    progress: u8,
    /// Accumulated log output
    log: String,
    /// Pending result message
    dialog: Option<ResultDialog>,
}

impl ConverterWindow {
    /// Create a new converter window.
    pub fn new(config: ForgeConfig) -> Self {
        if let Err(e) = Packager::locate(&config) {
            log::warn!("{}", e);
        }

        Self {
            builder: RequestBuilder::new(),
            config,
            active: None,
            state: WorkerState::Idle,
            progress: 0,
            log: String::new(),
            dialog: None,
        }
    }

    /// Whether a conversion is in flight.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// A new conversion may start: selections made, nothing running,
    /// no result waiting to be dismissed.
    fn can_convert(&self) -> bool {
        self.builder.is_ready() && !self.is_running() && self.dialog.is_none()
    }

    /// Show the converter in a central panel.
    pub fn show(&mut self, ctx: &egui::Context) {
        self.poll_worker();

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_contents(ui);
        });

        self.show_dialog(ctx);

        // Keep polling while the worker is busy
        if self.is_running() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }

    fn show_contents(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.heading(RichText::new("Python to EXE Converter").strong());
        });
        ui.add_space(8.0);

        self.show_selection(ui);
        ui.separator();

        self.show_options(ui);
        ui.separator();

        self.show_progress(ui);
    }

    /// Script and output directory pickers.
    fn show_selection(&mut self, ui: &mut egui::Ui) {
        let idle = !self.is_running();

        ui.horizontal(|ui| {
            let label = self
                .builder
                .script_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "No file selected".to_string());
            ui.label(label);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.add_enabled(idle, egui::Button::new("Select Python File")).clicked() {
                    self.open_file_dialog();
                }
            });
        });

        ui.horizontal(|ui| {
            let label = self
                .builder
                .output_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "No output directory selected".to_string());
            ui.label(RichText::new(label).monospace());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui
                    .add_enabled(idle, egui::Button::new("Select Output Directory"))
                    .clicked()
                {
                    self.open_folder_dialog();
                }
            });
        });
    }

    /// Mode and console selectors.
    fn show_options(&mut self, ui: &mut egui::Ui) {
        ui.add_enabled_ui(!self.is_running(), |ui| {
            ui.horizontal(|ui| {
                ui.label("Mode:");
                egui::ComboBox::from_id_source("packaging_mode")
                    .selected_text(self.builder.mode.display_name())
                    .show_ui(ui, |ui| {
                        for mode in PackagingMode::all() {
                            ui.selectable_value(&mut self.builder.mode, *mode, mode.display_name());
                        }
                    });

                ui.add_space(16.0);

                ui.label("Type:");
                egui::ComboBox::from_id_source("console_mode")
                    .selected_text(console_display_name(self.builder.console_visible))
                    .show_ui(ui, |ui| {
                        for console in [true, false] {
                            ui.selectable_value(
                                &mut self.builder.console_visible,
                                console,
                                console_display_name(console),
                            );
                        }
                    });
            });
        });
    }

    /// Progress bar, log and the convert button.
    fn show_progress(&mut self, ui: &mut egui::Ui) {
        ui.label(RichText::new(self.state.display()).weak());
        let bar = egui::ProgressBar::new(self.progress as f32 / 100.0)
            .show_percentage()
            .animate(self.is_running());
        ui.add(bar);

        ui.add_space(4.0);

        let log_height = (ui.available_height() - 40.0).max(120.0);
        egui::ScrollArea::vertical()
            .max_height(log_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                ui.add_sized(
                    Vec2::new(ui.available_width(), log_height),
                    egui::TextEdit::multiline(&mut self.log.as_str())
                        .code_editor()
                        .text_color(Color32::from_rgb(0, 255, 0)),
                );
            });

        ui.add_space(4.0);

        let can_convert = self.can_convert();
        ui.vertical_centered_justified(|ui| {
            if ui.add_enabled(can_convert, egui::Button::new("Convert")).clicked() {
                self.start_conversion();
            }
        });
    }

    /// Modal-style result window.
    fn show_dialog(&mut self, ctx: &egui::Context) {
        let Some(dialog) = self.dialog.clone() else {
            return;
        };

        let (title, color) = if dialog.succeeded {
            ("Success", Color32::GREEN)
        } else {
            ("Error", Color32::RED)
        };

        let mut close = false;
        egui::Window::new(RichText::new(title).color(color))
            .id(egui::Id::new("conversion_result"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(&dialog.message);
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    close = true;
                }
            });

        if close {
            self.dialog = None;
        }
    }

    /// Snapshot the selections and hand them to a fresh worker.
    fn start_conversion(&mut self) {
        if self.is_running() {
            return;
        }

        self.log.clear();
        self.progress = 0;
        self.state = WorkerState::Idle;

        let request = match self.builder.build() {
            Ok(request) => request,
            Err(e) => return self.fail_to_start(e.to_string()),
        };

        let packager = match Packager::locate(&self.config) {
            Ok(packager) => packager,
            Err(e) => return self.fail_to_start(e.to_string()),
        };

        log::info!("Converting {:?} into {:?}", request.script_path(), request.output_dir());
        self.active = Some(ConversionWorker::spawn(request, packager));
    }

    fn fail_to_start(&mut self, message: String) {
        log::error!("Could not start conversion: {}", message);
        self.log.push_str(&format!("Error: {}\n", message));
        self.state = WorkerState::Failed;
        self.dialog = Some(ResultDialog {
            succeeded: false,
            message,
        });
    }

    /// Drain worker events into the UI state.
    fn poll_worker(&mut self) {
        let Some(handle) = self.active.as_mut() else {
            return;
        };

        let mut outcome: Option<ConversionOutcome> = None;
        for event in handle.poll_events() {
            match event {
                WorkerEvent::LogLine(line) => {
                    self.log.push_str(&line);
                    self.log.push('\n');
                }
                WorkerEvent::Progress(percent) => self.progress = percent,
                WorkerEvent::State(state) => self.state = state,
                WorkerEvent::Finished(result) => outcome = Some(result),
            }
        }

        if let Some(outcome) = outcome {
            self.active = None;
            self.dialog = Some(ResultDialog {
                succeeded: outcome.succeeded,
                message: outcome.message,
            });
        }
    }

    /// Open file dialog to pick the script.
    fn open_file_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .set_title("Select Python File")
            .add_filter("Python Files", supported_script_extensions())
            .pick_file()
        {
            self.builder.script_path = Some(path);
        }
    }

    /// Open folder dialog to set output directory.
    fn open_folder_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .set_title("Select Output Directory")
            .pick_folder()
        {
            self.builder.output_dir = Some(path);
        }
    }
}

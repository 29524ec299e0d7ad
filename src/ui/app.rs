use eframe::egui;
use egui::{Color32, RichText, Ui};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::converters::PandocRunner;
use crate::models::{
    Phase, RepaintHook, Session, SettingsStore, ShutdownDecision, StatusLevel, DEFAULT_TIMEOUT,
    INPUT_FORMATS, OUTPUT_FORMATS,
};

pub struct App {
    session: Session,
    show_exit_confirm: bool,
    allowed_to_close: bool,
    show_about: bool,
}

impl App {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut session = Session::new(
            SettingsStore::default_location(),
            Arc::new(PandocRunner::new()),
        );

        // 后台线程完成后唤醒界面
        let ctx = cc.egui_ctx.clone();
        let repaint: RepaintHook = Arc::new(move || ctx.request_repaint());
        session.set_repaint_hook(repaint);

        Self {
            session,
            show_exit_confirm: false,
            allowed_to_close: false,
            show_about: false,
        }
    }

    fn render_converter(&mut self, ui: &mut Ui) {
        ui.label("Pandoc executable:");
        ui.horizontal(|ui| {
            let mut path = self.session.preferences().converter_path.clone();
            let edit = egui::TextEdit::singleline(&mut path).desired_width(380.0);
            if ui.add(edit).changed() {
                self.session.set_converter_path(path);
            }

            if ui.button("Browse...").clicked() {
                let mut dialog = rfd::FileDialog::new().set_title("Select the pandoc executable");
                if cfg!(target_os = "windows") {
                    dialog = dialog.add_filter("Executable", &["exe"]);
                }
                if let Some(file) = dialog.add_filter("All files", &["*"]).pick_file() {
                    self.session.set_converter_path(file.to_string_lossy().into_owned());
                }
            }

            if ui.button("Detect").on_hover_text("Search PATH for pandoc").clicked() {
                self.detect_converter();
            }
        });
    }

    fn detect_converter(&mut self) {
        match which::which("pandoc") {
            Ok(path) => {
                self.session.add_log(&format!("Found pandoc: {}", path.display()));
                self.session.set_converter_path(path.to_string_lossy().into_owned());
            }
            Err(e) => {
                log::info!("pandoc not found on PATH: {}", e);
                self.session.add_log("pandoc was not found on PATH");
            }
        }
    }

    fn render_input(&mut self, ui: &mut Ui) {
        ui.add_space(12.0);
        ui.strong("Input");

        ui.horizontal(|ui| {
            ui.label("Format:");
            let mut format = self.session.preferences().input_format.clone();
            format_combo(ui, "input_format", &mut format, INPUT_FORMATS);
            if format != self.session.preferences().input_format {
                self.session.set_input_format(&format);
            }

            if ui.button("Choose input file").clicked() {
                if let Some(file) = rfd::FileDialog::new()
                    .set_title("Select the file to convert")
                    .add_filter("All files", &["*"])
                    .add_filter("Word document", &["docx"])
                    .add_filter("OpenDocument Text", &["odt"])
                    .add_filter("HTML", &["html"])
                    .add_filter("Markdown", &["md"])
                    .add_filter("LaTeX", &["tex"])
                    .add_filter("CSV", &["csv"])
                    .pick_file()
                {
                    self.session.set_input_file(file);
                }
            }
        });

        match self.session.input_file() {
            Some(path) => {
                ui.label(RichText::new(path.display().to_string()).color(Color32::LIGHT_BLUE));
            }
            None => {
                ui.label(RichText::new("No file selected").weak());
            }
        }
    }

    fn render_output(&mut self, ui: &mut Ui) {
        ui.add_space(12.0);
        ui.strong("Output");

        ui.horizontal(|ui| {
            ui.label("Format:");
            let mut format = self.session.preferences().output_format.clone();
            format_combo(ui, "output_format", &mut format, OUTPUT_FORMATS);
            if format != self.session.preferences().output_format {
                self.session.set_output_format(&format);
            }
        });
    }

    fn render_actions(&mut self, ui: &mut Ui) {
        ui.add_space(16.0);
        ui.horizontal(|ui| {
            let convert = egui::Button::new(RichText::new("Convert").strong());
            if ui.add_enabled(self.session.can_convert(), convert).clicked() {
                self.session.start_conversion();
            }

            if let Some(output) = self.session.last_output().map(Path::to_path_buf) {
                if ui.button("Open output folder").clicked() {
                    let dir = output.parent().unwrap_or(Path::new("."));
                    if let Err(e) = open::that(dir) {
                        self.session
                            .report_error(&format!("Error: could not open {}: {}", dir.display(), e));
                    }
                }
            }
        });
    }

    fn render_status(&mut self, ui: &mut Ui) {
        ui.add_space(16.0);
        ui.label("Status:");
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.horizontal(|ui| {
                match self.session.phase() {
                    Phase::Busy => {
                        ui.spinner();
                        let secs = self.session.elapsed().unwrap_or_default().as_secs();
                        ui.label(format!("{} ({} s)", self.session.status(), secs));
                    }
                    Phase::Idle => {
                        let color = match self.session.status_level() {
                            StatusLevel::Success => Color32::from_rgb(80, 180, 80),
                            StatusLevel::Error => Color32::from_rgb(220, 80, 80),
                            StatusLevel::Info => ui.visuals().text_color(),
                        };
                        ui.label(RichText::new(self.session.status()).color(color));
                    }
                }
            });
        });
    }

    fn render_logs(&mut self, ui: &mut Ui) {
        ui.add_space(8.0);
        ui.collapsing("Log", |ui| {
            egui::ScrollArea::vertical()
                .max_height(150.0)
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for log in self.session.logs() {
                        ui.label(RichText::new(log).monospace());
                    }
                });
        });
    }

    // 转换进行中关闭窗口时的确认对话框
    fn render_exit_confirm(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        if !self.show_exit_confirm {
            return;
        }

        egui::Window::new("Confirm exit")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("A conversion is still running. Exit anyway?");
                ui.horizontal(|ui| {
                    if ui.button("Exit").clicked() {
                        self.show_exit_confirm = false;
                        self.allowed_to_close = true;
                        self.session.shutdown();
                        frame.close();
                    }
                    if ui.button("Cancel").clicked() {
                        self.show_exit_confirm = false;
                    }
                });
            });
    }

    fn render_about(&mut self, ctx: &egui::Context) {
        if !self.show_about {
            return;
        }

        egui::Window::new("About")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.heading("Pandoc Frontend");
                ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                ui.separator();
                ui.label("Converts documents by running pandoc with the selected formats.");
                ui.label(format!(
                    "A conversion is stopped after {} seconds.",
                    DEFAULT_TIMEOUT.as_secs()
                ));
                ui.label("The output file is written next to the input file.");
                ui.separator();
                if ui.button("Close").clicked() {
                    self.show_about = false;
                }
            });
    }
}

fn format_combo(ui: &mut Ui, id: &str, selected: &mut String, formats: &[&str]) {
    let text = if selected.is_empty() {
        "(select)".to_string()
    } else {
        selected.clone()
    };
    egui::ComboBox::from_id_source(id)
        .selected_text(text)
        .width(160.0)
        .show_ui(ui, |ui| {
            for format in formats {
                ui.selectable_value(selected, format.to_string(), *format);
            }
        });
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        // Process background task results
        self.session.process_conversion_results();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Exit").clicked() {
                        ui.close_menu();
                        // 经过 on_close_event，转换中会先询问
                        frame.close();
                    }
                });

                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() {
                        self.show_about = true;
                        ui.close_menu();
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_converter(ui);
            self.render_input(ui);
            self.render_output(ui);
            self.render_actions(ui);
            self.render_status(ui);
            self.render_logs(ui);
        });

        self.render_exit_confirm(ctx, frame);
        self.render_about(ctx);

        // 转换中每秒刷新一次耗时
        if self.session.is_busy() {
            ctx.request_repaint_after(Duration::from_secs(1));
        }
    }

    fn on_close_event(&mut self) -> bool {
        if self.allowed_to_close {
            return true;
        }

        match self.session.request_shutdown() {
            ShutdownDecision::Proceed => {
                self.session.shutdown();
                true
            }
            ShutdownDecision::NeedsConfirmation => {
                self.show_exit_confirm = true;
                false
            }
        }
    }

    // Override the on_exit method to ensure settings are saved
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.session.shutdown();
    }
}

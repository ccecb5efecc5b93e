use crate::charts::ChartArtifact;
use crate::config::Settings;
use crate::session::Session;
use crate::summary::SUMMARY_FILE_NAME;
use crate::utils::{display_dataframe, save_download};
use egui::{Color32, RichText, ScrollArea, TextEdit};
use log::warn;
use rfd::FileDialog;
use std::path::Path;

const PREVIEW_ROWS: usize = 5;
const CHART_DISPLAY_WIDTH: f32 = 480.0;

struct ChartView {
    artifact: ChartArtifact,
    texture: Option<egui::TextureHandle>,
}

pub struct App {
    label: String,
    session: Session,
    charts: Vec<ChartView>,
    chart_failures: Vec<String>,
    charts_stale: bool,
    question: String,
    answer: Option<Result<String, String>>,
    status: Option<String>,
}

impl App {
    /// Called once before the first frame.
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: Settings) -> Self {
        Self {
            label: "CSV Explorer".to_owned(),
            session: Session::new(settings),
            charts: Vec::new(),
            chart_failures: Vec::new(),
            charts_stale: true,
            question: String::new(),
            answer: None,
            status: None,
        }
    }

    fn open(&mut self, path: &Path) {
        self.charts.clear();
        self.chart_failures.clear();
        self.charts_stale = true;
        self.answer = None;
        self.status = self.session.load_path(path).err().map(|e| e.to_string());
    }

    fn rebuild_charts(&mut self, ctx: &egui::Context) {
        self.charts.clear();
        self.chart_failures.clear();
        if let Some(battery) = self.session.charts() {
            for (spec, e) in battery.failures {
                self.chart_failures.push(format!("{}: {e}", spec.file_name()));
            }
            for artifact in battery.artifacts {
                let texture = match load_texture(ctx, &artifact) {
                    Ok(texture) => Some(texture),
                    Err(e) => {
                        warn!("could not display {}: {e}", artifact.file_name());
                        None
                    }
                };
                self.charts.push(ChartView { artifact, texture });
            }
        }
        self.charts_stale = false;
    }

    fn show_content(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.heading(&self.label);
        if let Some(status) = &self.status {
            ui.colored_label(Color32::RED, status);
        }
        let Some(table) = self.session.table() else {
            ui.label("Open a CSV file from the File menu to get started.");
            return;
        };

        let source = self.session.source().unwrap_or("uploaded file").to_owned();
        ui.label(RichText::new(format!("Preview of {source}")).strong());
        let preview = table.preview(PREVIEW_ROWS);
        ui.push_id("preview", |ui| display_dataframe(&preview, ui));
        ui.label("Missing values filled: median for numeric columns, most frequent value for the rest.");
        ui.add_space(10.0);

        ui.horizontal(|ui| {
            if ui.button("Show/Hide Statistical Summary").clicked() {
                self.session.toggle_summary();
            }
            if ui.button("Show/Hide Automatic Charts").clicked() {
                if self.session.toggle_charts() {
                    self.charts_stale = true;
                } else {
                    self.charts.clear();
                    self.chart_failures.clear();
                }
            }
        });

        self.show_summary(ui);
        self.show_charts(ctx, ui);
        ui.separator();
        self.show_question(ui);
    }

    fn show_summary(&mut self, ui: &mut egui::Ui) {
        let Some(result) = self.session.summary() else {
            return;
        };
        ui.add_space(10.0);
        ui.heading("Statistical Summary");
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                ui.colored_label(Color32::RED, e.to_string());
                return;
            }
        };
        if report.is_empty() {
            ui.label("No numeric columns to describe.");
        } else if let Ok(stats) = report.to_dataframe() {
            ui.push_id("summary", |ui| display_dataframe(&stats, ui));
        }
        ui.label(RichText::new("Null values per column (after cleaning)").strong());
        if let Ok(nulls) = report.null_counts_dataframe() {
            ui.push_id("nulls", |ui| display_dataframe(&nulls, ui));
        }
        if ui.button("Download Statistical Summary CSV").clicked() {
            let saved = self
                .session
                .summary_csv()
                .map_err(|e| e.to_string())
                .and_then(|bytes| save_download(SUMMARY_FILE_NAME, "csv", &bytes));
            self.status = saved.err();
        }
    }

    fn show_charts(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        if !self.session.toggles().show_charts() {
            return;
        }
        if self.charts_stale {
            self.rebuild_charts(ctx);
        }
        ui.add_space(10.0);
        ui.heading("Automatic Charts for Numeric Columns");
        if self.charts.is_empty() && self.chart_failures.is_empty() {
            ui.label("No numeric columns to plot.");
            return;
        }
        for failure in &self.chart_failures {
            ui.colored_label(Color32::YELLOW, failure);
        }
        let mut save_error = None;
        for view in &self.charts {
            ui.label(RichText::new(view.artifact.spec.title()).strong());
            if let Some(texture) = &view.texture {
                ui.add(
                    egui::Image::new(egui::load::SizedTexture::from_handle(texture))
                        .max_width(CHART_DISPLAY_WIDTH),
                );
            }
            let file_name = view.artifact.file_name();
            if ui.button(format!("Download {file_name}")).clicked() {
                if let Err(e) = save_download(&file_name, "png", &view.artifact.png) {
                    save_error = Some(e);
                }
            }
        }
        if save_error.is_some() {
            self.status = save_error;
        }
    }

    fn show_question(&mut self, ui: &mut egui::Ui) {
        ui.heading("Ask a question about your CSV");
        let settings = self.session.settings();
        if settings.api_key.is_none() {
            ui.label("Set OPENAI_API_KEY to enable questions.");
        }
        let notice = settings.code_execution_notice();
        if settings.allow_code_execution {
            ui.colored_label(Color32::YELLOW, notice);
        } else {
            ui.label(notice);
        }
        let mut submitted = false;
        ui.horizontal(|ui| {
            let response = ui.add(
                TextEdit::singleline(&mut self.question)
                    .hint_text("e.g. Which city has the highest average age?")
                    .desired_width(420.0),
            );
            submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            submitted |= ui.button("Ask").clicked();
        });
        if submitted && !self.question.trim().is_empty() {
            self.answer = Some(self.session.ask(&self.question).map_err(|e| e.to_string()));
        }
        match &self.answer {
            Some(Ok(answer)) => {
                ui.label(RichText::new("AI Response").strong());
                ui.label(answer);
            }
            Some(Err(e)) => {
                ui.colored_label(Color32::RED, e);
            }
            None => {}
        }
    }
}

fn load_texture(
    ctx: &egui::Context,
    artifact: &ChartArtifact,
) -> Result<egui::TextureHandle, image::ImageError> {
    let image = image::load_from_memory(&artifact.png)?;
    let rgba = image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, &rgba);
    Ok(ctx.load_texture(
        artifact.file_name(),
        color_image,
        egui::TextureOptions::LINEAR,
    ))
}

impl eframe::App for App {
    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open CSV…").clicked() {
                        ui.close_menu();
                        if let Some(path) = FileDialog::new().add_filter("CSV", &["csv"]).pick_file()
                        {
                            self.open(&path);
                        }
                    }
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| self.show_content(ctx, ui));
            egui::warn_if_debug_build(ui);
        });
    }
}

//! Audio digitizer window: egui/eframe application.
//!
//! # Architecture
//!
//! [`DigitizerApp`] is the top-level [`eframe::App`].  It owns only UI state
//! and two channel endpoints:
//!
//! * `command_tx`: sends [`PipelineCommand`] to the pipeline orchestrator.
//! * `event_rx`: receives [`PipelineEvent`] with ready-to-draw
//!   [`SignalView`]s.
//!
//! No buffer ever reaches the UI thread.
//!
//! # Layout
//!
//! ```text
//! ┌ controls ──────────────────────────────────────────────────────────┐
//! │ Duration [5.0] (Record) │ Rate [22050 ▾] Bits [16 ▾] (Convert) │ … │
//! ├ Recorded ────────────────────────┬ Digitized ──────────────────────┤
//! │ magnitude spectrum / mel heat map│ magnitude spectrum / mel heat map│
//! ├ status ──────────────────────────┴─────────────────────────────────┤
//! ```

use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::audio::{BitDepth, MelSpectrogram, SpectrumResult};
use crate::config::AppConfig;
use crate::export::ExportFormat;
use crate::pipeline::{
    parse_duration, ConversionRequest, ErrorKind, PipelineCommand, PipelineError, PipelineEvent,
    PipelineState, PipelineTask, SignalView,
};

const RECORDED_COLOR: egui::Color32 = egui::Color32::from_rgb(68, 136, 255);
const DIGITIZED_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 136, 68);

// ---------------------------------------------------------------------------
// Status line
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Status {
    Info(String),
    Error { kind: ErrorKind, message: String },
}

// ---------------------------------------------------------------------------
// Plot
// ---------------------------------------------------------------------------

/// One of the two signal panes.
#[derive(Default)]
struct Plot {
    view: Option<Box<SignalView>>,
    /// Mel heat map uploaded for `view`, built lazily.
    mel_texture: Option<egui::TextureHandle>,
}

impl Plot {
    fn set(&mut self, view: Box<SignalView>) {
        self.view = Some(view);
        self.mel_texture = None;
    }

    fn clear(&mut self) {
        self.view = None;
        self.mel_texture = None;
    }
}

// ---------------------------------------------------------------------------
// DigitizerApp
// ---------------------------------------------------------------------------

/// eframe application: record, digitize, compare, export.
pub struct DigitizerApp {
    // ── Form fields ──────────────────────────────────────────────────────
    duration_text: String,
    sample_rate: u32,
    bit_depth: BitDepth,
    export_path: String,
    show_mel: bool,

    // ── Pipeline mirror ──────────────────────────────────────────────────
    /// Phase of the orchestrator's pipeline, as reported by events.
    state: PipelineState,
    /// Task in flight; controls are disabled while set.
    busy: Option<PipelineTask>,
    recorded: Plot,
    digitized: Plot,
    status: Option<Status>,

    // ── Channels ─────────────────────────────────────────────────────────
    command_tx: mpsc::Sender<PipelineCommand>,
    event_rx: mpsc::Receiver<PipelineEvent>,

    config: AppConfig,
}

impl DigitizerApp {
    /// Create the app with form defaults taken from `config`.
    pub fn new(
        command_tx: mpsc::Sender<PipelineCommand>,
        event_rx: mpsc::Receiver<PipelineEvent>,
        config: AppConfig,
    ) -> Self {
        Self {
            duration_text: format!("{}", config.capture.default_duration_secs),
            sample_rate: config.conversion.default_sample_rate,
            bit_depth: config.conversion.default_bit_depth,
            export_path: config.export.default_file_name.clone(),
            show_mel: config.spectrum.show_mel,
            state: PipelineState::Idle,
            busy: None,
            recorded: Plot::default(),
            digitized: Plot::default(),
            status: None,
            command_tx,
            event_rx,
            config,
        }
    }

    // ── Channel polling ──────────────────────────────────────────────────

    /// Drain all pending pipeline events (non-blocking).
    fn poll_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                PipelineEvent::Busy(task) => self.busy = Some(task),
                PipelineEvent::Captured(view) => {
                    self.status = Some(Status::Info(format!(
                        "Recorded {:.2} s at {} Hz",
                        view.duration_secs, view.sample_rate
                    )));
                    self.recorded.set(view);
                    self.digitized.clear();
                    self.state = PipelineState::Captured;
                    self.busy = None;
                }
                PipelineEvent::Converted { view, request } => {
                    self.status = Some(Status::Info(format!(
                        "Digitized to {} Hz / {}",
                        request.target_sample_rate(),
                        request.target_bit_depth()
                    )));
                    self.digitized.set(view);
                    self.state = PipelineState::Converted;
                    self.busy = None;
                }
                PipelineEvent::Exported { path, format } => {
                    self.status = Some(Status::Info(format!(
                        "Saved {format} to {}",
                        path.display()
                    )));
                    self.busy = None;
                }
                PipelineEvent::Failed { kind, message } => {
                    self.status = Some(Status::Error { kind, message });
                    self.busy = None;
                }
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────

    fn send(&mut self, command: PipelineCommand, task: PipelineTask) {
        match self.command_tx.try_send(command) {
            Ok(()) => {
                self.busy = Some(task);
                self.status = None;
            }
            Err(e) => {
                log::warn!("ui: could not queue command: {e}");
                self.report(PipelineError::Internal(format!("pipeline unavailable: {e}")));
            }
        }
    }

    fn report(&mut self, error: PipelineError) {
        self.status = Some(Status::Error {
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    /// The loaded config with the current form values as next session's
    /// defaults. An unparsable duration keeps the previous default.
    fn remembered_config(&self) -> AppConfig {
        let mut config = self.config.clone();
        if let Ok(secs) = parse_duration(&self.duration_text) {
            config.capture.default_duration_secs = secs;
        }
        config.conversion.default_sample_rate = self.sample_rate;
        config.conversion.default_bit_depth = self.bit_depth;
        config.export.default_file_name = self.export_path.clone();
        config.spectrum.show_mel = self.show_mel;
        config
    }

    fn on_record(&mut self) {
        match parse_duration(&self.duration_text) {
            Ok(duration_secs) => self.send(
                PipelineCommand::Capture { duration_secs },
                PipelineTask::Capturing,
            ),
            Err(e) => self.report(e),
        }
    }

    fn on_convert(&mut self) {
        match ConversionRequest::with_depth(self.sample_rate, self.bit_depth) {
            Ok(request) => self.send(PipelineCommand::Convert(request), PipelineTask::Converting),
            Err(e) => self.report(e.into()),
        }
    }

    fn on_export(&mut self) {
        let path = PathBuf::from(self.export_path.trim());
        match ExportFormat::from_path(&path) {
            Ok(format) => self.send(
                PipelineCommand::Export { path, format },
                PipelineTask::Exporting,
            ),
            Err(e) => self.report(e.into()),
        }
    }

    // ── Panels ───────────────────────────────────────────────────────────

    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        let idle = self.busy.is_none();

        ui.horizontal(|ui| {
            ui.label("Duration (s)");
            ui.add(egui::TextEdit::singleline(&mut self.duration_text).desired_width(50.0));
            if ui
                .add_enabled(idle, egui::Button::new("Record"))
                .clicked()
            {
                self.on_record();
            }

            ui.separator();

            egui::ComboBox::from_label("Hz")
                .selected_text(self.sample_rate.to_string())
                .show_ui(ui, |ui| {
                    for &rate in &self.config.conversion.sample_rate_choices {
                        ui.selectable_value(&mut self.sample_rate, rate, rate.to_string());
                    }
                });
            egui::ComboBox::from_label("bits")
                .selected_text(self.bit_depth.bits().to_string())
                .show_ui(ui, |ui| {
                    for &depth in &self.config.conversion.bit_depth_choices {
                        ui.selectable_value(&mut self.bit_depth, depth, depth.bits().to_string());
                    }
                });
            if ui
                .add_enabled(idle && self.state.can_convert(), egui::Button::new("Convert"))
                .clicked()
            {
                self.on_convert();
            }

            ui.separator();

            ui.add(egui::TextEdit::singleline(&mut self.export_path).desired_width(220.0));
            if ui
                .add_enabled(idle && self.state.is_exportable(), egui::Button::new("Export"))
                .clicked()
            {
                self.on_export();
            }

            ui.separator();
            ui.checkbox(&mut self.show_mel, "Mel spectrogram");
        });
    }

    fn draw_status(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            match self.busy {
                Some(task) => {
                    ui.spinner();
                    ui.label(task.label());
                }
                None => {
                    ui.label(
                        egui::RichText::new(self.state.label())
                            .color(egui::Color32::from_rgb(160, 160, 160)),
                    );
                }
            }
            ui.separator();
            match &self.status {
                Some(Status::Info(text)) => {
                    ui.label(egui::RichText::new(text).color(egui::Color32::from_rgb(80, 200, 120)));
                }
                Some(Status::Error { kind, message }) => {
                    ui.label(
                        egui::RichText::new(format!("{kind}: {message}"))
                            .color(egui::Color32::from_rgb(255, 100, 100)),
                    );
                }
                None => {}
            }
        });
    }

    fn draw_plot(
        ui: &mut egui::Ui,
        plot: &mut Plot,
        title: &str,
        color: egui::Color32,
        show_mel: bool,
    ) {
        let heading = match &plot.view {
            Some(v) => format!(
                "{title}: {} Hz, {}, {:.2} s, peak {:.3}, rms {:.3}",
                v.sample_rate, v.bit_depth, v.duration_secs, v.peak, v.rms
            ),
            None => title.to_string(),
        };
        ui.label(egui::RichText::new(heading).strong());

        let (rect, _) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 4.0, egui::Color32::from_gray(24));

        let Some(view) = plot.view.as_ref() else {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "no data",
                egui::FontId::proportional(14.0),
                egui::Color32::from_gray(110),
            );
            return;
        };

        let inner = rect.shrink(8.0);
        match (show_mel, view.mel.as_ref()) {
            (true, Some(mel)) => {
                let texture = plot.mel_texture.get_or_insert_with(|| {
                    ui.ctx().load_texture(
                        format!("mel-{title}"),
                        mel_image(mel),
                        egui::TextureOptions::LINEAR,
                    )
                });
                painter.image(
                    texture.id(),
                    inner,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
                let top = mel.band_frequencies.last().copied().unwrap_or(0.0);
                let end = mel.frame_time(mel.n_frames().saturating_sub(1));
                axis_labels(&painter, inner, &format_hz(top), &format!("{end:.2} s"));
            }
            (true, None) => {
                painter.text(
                    inner.center(),
                    egui::Align2::CENTER_CENTER,
                    "mel spectrogram disabled",
                    egui::FontId::proportional(14.0),
                    egui::Color32::from_gray(110),
                );
            }
            (false, _) => {
                let points = spectrum_points(&view.spectrum, inner);
                painter.add(egui::Shape::line(points, egui::Stroke::new(1.0, color)));
                axis_labels(
                    &painter,
                    inner,
                    &format!("|X| max {:.1}", view.spectrum.max_magnitude()),
                    &format_hz(view.spectrum.nyquist()),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Drawing helpers
// ---------------------------------------------------------------------------

fn axis_labels(painter: &egui::Painter, rect: egui::Rect, top_left: &str, bottom_right: &str) {
    let font = egui::FontId::monospace(11.0);
    let color = egui::Color32::from_gray(170);
    painter.text(rect.left_top(), egui::Align2::LEFT_TOP, top_left, font.clone(), color);
    painter.text(rect.right_bottom(), egui::Align2::RIGHT_BOTTOM, bottom_right, font, color);
}

fn format_hz(hz: f32) -> String {
    if hz >= 1_000.0 {
        format!("{:.1} kHz", hz / 1_000.0)
    } else {
        format!("{hz:.0} Hz")
    }
}

/// Map spectrum bins into `rect`: frequency 0..Nyquist left to right,
/// magnitude 0..max bottom to top.
fn spectrum_points(spectrum: &SpectrumResult, rect: egui::Rect) -> Vec<egui::Pos2> {
    let nyquist = spectrum.nyquist().max(f32::EPSILON);
    let max = spectrum.max_magnitude().max(f32::EPSILON);
    spectrum
        .bins
        .iter()
        .map(|bin| {
            egui::pos2(
                rect.left() + rect.width() * (bin.frequency / nyquist).min(1.0),
                rect.bottom() - rect.height() * (bin.magnitude / max),
            )
        })
        .collect()
}

/// Dark blue → magenta → yellow ramp for `t` in `[0, 1]`.
fn heat_color(t: f32) -> egui::Color32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8, s: f32| (a as f32 + (b as f32 - a as f32) * s).round() as u8;
    let (lo, hi, s) = if t < 0.5 {
        ((10, 10, 40), (180, 40, 120), t * 2.0)
    } else {
        ((180, 40, 120), (250, 230, 80), (t - 0.5) * 2.0)
    };
    egui::Color32::from_rgb(lerp(lo.0, hi.0, s), lerp(lo.1, hi.1, s), lerp(lo.2, hi.2, s))
}

/// Heat-map image of `mel`: time on x, lowest band at the bottom.
fn mel_image(mel: &MelSpectrogram) -> egui::ColorImage {
    let width = mel.n_frames().max(1);
    let height = mel.n_mels().max(1);
    let mut image = egui::ColorImage::new([width, height], egui::Color32::BLACK);
    let range = mel.top_db.max(f32::EPSILON);

    for (x, frame) in mel.frames.iter().enumerate() {
        for (band, &db) in frame.iter().enumerate() {
            let y = height - 1 - band;
            image.pixels[y * width + x] = heat_color((db + range) / range);
        }
    }
    image
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for DigitizerApp {
    /// Called every frame by eframe.  Polls the event channel, then renders.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();

        if self.busy.is_some() {
            // Keep polling while the orchestrator works.
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            self.draw_controls(ui);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            self.draw_status(ui);
        });

        let show_mel = self.show_mel;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |cols| {
                Self::draw_plot(&mut cols[0], &mut self.recorded, "Recorded", RECORDED_COLOR, show_mel);
                Self::draw_plot(
                    &mut cols[1],
                    &mut self.digitized,
                    "Digitized",
                    DIGITIZED_COLOR,
                    show_mel,
                );
            });
        });
    }

    /// Persist the form's last values in the config on exit (best-effort).
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("audio digitizer window closing");
        let config = self.remembered_config();
        if config != self.config {
            if let Err(e) = config.save() {
                log::warn!("Failed to save settings: {e:#}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

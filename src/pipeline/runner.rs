//! Pipeline orchestrator: serialises UI commands onto the state machine.
//!
//! [`PipelineOrchestrator`] owns the [`ConversionPipeline`] and responds to
//! [`PipelineCommand`]s received over a `tokio::sync::mpsc` channel, one at
//! a time.  Results go back to the UI as [`PipelineEvent`]s carrying plain
//! display data; the UI never sees a buffer.
//!
//! # Command flow
//!
//! ```text
//! Capture { duration_secs }
//!   └─▶ Busy(Capturing) → spawn_blocking(pipeline.capture) → write capture file
//!         └─▶ Captured(view) | Failed
//!
//! Convert(request)
//!   └─▶ Busy(Converting) → spawn_blocking(pipeline.convert)
//!         └─▶ Converted { view, request } | Failed
//!
//! Export { path, format }
//!   └─▶ Busy(Exporting) → spawn_blocking(pipeline.export)
//!         └─▶ Exported { path, format } | Failed
//! ```
//!
//! Blocking work (device I/O, resampling, FFTs, ffmpeg) runs on
//! `tokio::task::spawn_blocking`.  The pipeline is moved into the worker and
//! handed back with the result, so no lock is ever needed.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::{
    analyze, AudioBuffer, BitDepth, CaptureDevice, CaptureFile, MelConfig, MelSpectrogram,
    SpectrumResult,
};
use crate::config::AppConfig;
use crate::export::{AudioExporter, ExportFormat};

use super::convert::ConversionRequest;
use super::error::{ErrorKind, PipelineError};
use super::state::ConversionPipeline;

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

/// A user action forwarded by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineCommand {
    Capture { duration_secs: f32 },
    Convert(ConversionRequest),
    Export { path: PathBuf, format: ExportFormat },
}

/// What the orchestrator is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineTask {
    Capturing,
    Converting,
    Exporting,
}

impl PipelineTask {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineTask::Capturing => "Recording…",
            PipelineTask::Converting => "Converting…",
            PipelineTask::Exporting => "Exporting…",
        }
    }
}

/// Immutable display data for one buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalView {
    pub sample_rate: u32,
    pub bit_depth: BitDepth,
    pub num_samples: usize,
    pub duration_secs: f64,
    pub peak: f32,
    pub rms: f32,
    /// Magnitude spectrum reduced to the configured number of points.
    pub spectrum: SpectrumResult,
    pub mel: Option<MelSpectrogram>,
}

impl SignalView {
    fn of(buffer: &AudioBuffer, display_points: usize, mel: Option<&MelConfig>) -> Self {
        Self {
            sample_rate: buffer.sample_rate(),
            bit_depth: buffer.bit_depth(),
            num_samples: buffer.len(),
            duration_secs: buffer.duration_secs(),
            peak: buffer.peak(),
            rms: buffer.rms(),
            spectrum: analyze(buffer).decimate(display_points),
            mel: mel.map(|config| MelSpectrogram::compute(buffer, config)),
        }
    }
}

/// Result notifications sent back to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Busy(PipelineTask),
    Captured(Box<SignalView>),
    Converted {
        view: Box<SignalView>,
        request: ConversionRequest,
    },
    Exported {
        path: PathBuf,
        format: ExportFormat,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// OrchestratorSettings
// ---------------------------------------------------------------------------

/// The slice of [`AppConfig`] the orchestrator needs.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub capture_sample_rate: u32,
    pub display_points: usize,
    /// `None` skips the mel spectrogram.
    pub mel: Option<MelConfig>,
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            capture_sample_rate: config.capture.sample_rate,
            display_points: config.spectrum.display_points,
            mel: Some(config.spectrum.mel.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Drives the [`ConversionPipeline`] from UI commands.
///
/// Create with [`PipelineOrchestrator::new`], then call [`run`](Self::run)
/// inside a tokio task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use audio_digitizer::audio::CpalCapture;
/// use audio_digitizer::config::AppConfig;
/// use audio_digitizer::export::AudioExporter;
/// use audio_digitizer::pipeline::{OrchestratorSettings, PipelineCommand, PipelineOrchestrator};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let (cmd_tx, cmd_rx) = tokio::sync::mpsc::channel(16);
/// let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(16);
///
/// let orchestrator = PipelineOrchestrator::new(
///     Arc::new(CpalCapture::new(None)),
///     AudioExporter::from_config(&config.export),
///     OrchestratorSettings::from(&config),
///     event_tx,
/// );
/// tokio::spawn(orchestrator.run(cmd_rx));
///
/// cmd_tx.send(PipelineCommand::Capture { duration_secs: 2.0 }).await.unwrap();
/// while let Some(event) = event_rx.recv().await {
///     println!("{event:?}");
/// }
/// # }
/// ```
pub struct PipelineOrchestrator {
    pipeline: ConversionPipeline,
    device: Arc<dyn CaptureDevice>,
    exporter: AudioExporter,
    capture_file: Option<CaptureFile>,
    settings: OrchestratorSettings,
    events: mpsc::Sender<PipelineEvent>,
}

impl PipelineOrchestrator {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        exporter: AudioExporter,
        settings: OrchestratorSettings,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Self {
        Self {
            pipeline: ConversionPipeline::new(),
            device,
            exporter,
            capture_file: None,
            settings,
            events,
        }
    }

    /// Keep the latest recording on disk at `file`.
    pub fn with_capture_file(mut self, file: CaptureFile) -> Self {
        self.capture_file = Some(file);
        self
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `commands` is closed, then return the final pipeline.
    pub async fn run(mut self, mut commands: mpsc::Receiver<PipelineCommand>) -> ConversionPipeline {
        while let Some(command) = commands.recv().await {
            log::debug!("pipeline: {command:?} in state {:?}", self.pipeline.state());
            match command {
                PipelineCommand::Capture { duration_secs } => self.handle_capture(duration_secs).await,
                PipelineCommand::Convert(request) => self.handle_convert(request).await,
                PipelineCommand::Export { path, format } => self.handle_export(path, format).await,
            }
        }

        log::info!("pipeline: command channel closed, orchestrator shutting down");
        self.pipeline
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    async fn handle_capture(&mut self, duration_secs: f32) {
        self.emit(PipelineEvent::Busy(PipelineTask::Capturing)).await;

        let device = Arc::clone(&self.device);
        let rate = self.settings.capture_sample_rate;
        let capture_file = self.capture_file.clone();
        let points = self.settings.display_points;
        let mel = self.settings.mel.clone();

        let result = self
            .run_blocking(move |pipeline| {
                let original = pipeline.capture(device.as_ref(), duration_secs, rate)?;
                if let Some(file) = capture_file {
                    if let Err(e) = file.write(&original) {
                        log::warn!("pipeline: could not save capture file: {e}");
                    }
                }
                Ok(SignalView::of(&original, points, mel.as_ref()))
            })
            .await;

        match result {
            Ok(view) => self.emit(PipelineEvent::Captured(Box::new(view))).await,
            Err(e) => self.fail(e).await,
        }
    }

    async fn handle_convert(&mut self, request: ConversionRequest) {
        self.emit(PipelineEvent::Busy(PipelineTask::Converting)).await;

        let points = self.settings.display_points;
        let mel = self.settings.mel.clone();

        let result = self
            .run_blocking(move |pipeline| {
                let converted = pipeline.convert(&request)?;
                Ok(SignalView::of(&converted, points, mel.as_ref()))
            })
            .await;

        match result {
            Ok(view) => {
                self.emit(PipelineEvent::Converted {
                    view: Box::new(view),
                    request,
                })
                .await
            }
            Err(e) => self.fail(e).await,
        }
    }

    async fn handle_export(&mut self, path: PathBuf, format: ExportFormat) {
        self.emit(PipelineEvent::Busy(PipelineTask::Exporting)).await;

        let exporter = self.exporter.clone();
        let target = path.clone();
        let result = self
            .run_blocking(move |pipeline| {
                pipeline.export(&exporter, &target, format)?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => self.emit(PipelineEvent::Exported { path, format }).await,
            Err(e) => self.fail(e).await,
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Run `work` on the blocking pool with exclusive access to the pipeline.
    ///
    /// If the worker panics the pipeline it held is lost and a fresh `Idle`
    /// one takes its place.
    async fn run_blocking<T, F>(&mut self, work: F) -> Result<T, PipelineError>
    where
        T: Send + 'static,
        F: FnOnce(&mut ConversionPipeline) -> Result<T, PipelineError> + Send + 'static,
    {
        let mut pipeline = std::mem::take(&mut self.pipeline);
        let joined = tokio::task::spawn_blocking(move || {
            let result = work(&mut pipeline);
            (pipeline, result)
        })
        .await;

        match joined {
            Ok((pipeline, result)) => {
                self.pipeline = pipeline;
                result
            }
            Err(e) => {
                log::error!("pipeline: worker task failed, resetting to Idle: {e}");
                Err(PipelineError::Internal(e.to_string()))
            }
        }
    }

    async fn fail(&self, error: PipelineError) {
        log::error!("pipeline error: {error}");
        self.emit(PipelineEvent::Failed {
            kind: error.kind(),
            message: error.to_string(),
        })
        .await;
    }

    async fn emit(&self, event: PipelineEvent) {
        if self.events.send(event).await.is_err() {
            log::debug!("pipeline: event receiver dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_support::sine_buffer;
    use crate::audio::{CaptureError, MockCapture};
    use crate::pipeline::PipelineState;
    use tempfile::tempdir;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            capture_sample_rate: 44_100,
            display_points: 512,
            mel: None,
        }
    }

    fn make_orchestrator(
        device: Arc<dyn CaptureDevice>,
    ) -> (PipelineOrchestrator, mpsc::Receiver<PipelineEvent>) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let orc = PipelineOrchestrator::new(device, AudioExporter::default(), settings(), event_tx);
        (orc, event_rx)
    }

    fn one_second_tone() -> Arc<dyn CaptureDevice> {
        Arc::new(MockCapture::ok(sine_buffer(440.0, 0.5, 44_100, 1.0)))
    }

    /// Send `commands`, close the channel, run to completion and collect
    /// every event.
    async fn drive(
        orc: PipelineOrchestrator,
        mut events: mpsc::Receiver<PipelineEvent>,
        commands: Vec<PipelineCommand>,
    ) -> (ConversionPipeline, Vec<PipelineEvent>) {
        let (tx, rx) = mpsc::channel(commands.len().max(1));
        for command in commands {
            tx.send(command).await.unwrap();
        }
        drop(tx);

        let pipeline = orc.run(rx).await;
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        (pipeline, seen)
    }

    fn failures(events: &[PipelineEvent]) -> Vec<ErrorKind> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Failed { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn capture_emits_busy_then_captured() {
        let (orc, events) = make_orchestrator(one_second_tone());
        let (pipeline, events) = drive(
            orc,
            events,
            vec![PipelineCommand::Capture { duration_secs: 1.0 }],
        )
        .await;

        assert_eq!(pipeline.state(), PipelineState::Captured);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], PipelineEvent::Busy(PipelineTask::Capturing));
        match &events[1] {
            PipelineEvent::Captured(view) => {
                assert_eq!(view.sample_rate, 44_100);
                assert_eq!(view.num_samples, 44_100);
                assert!(view.rms > 0.0 && view.rms <= view.peak);
                assert!(view.spectrum.bins.len() <= 512);
                assert!(view.mel.is_none());
            }
            other => panic!("expected Captured, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn capture_then_convert_reaches_converted() {
        let (orc, events) = make_orchestrator(one_second_tone());
        let request = ConversionRequest::new(8_000, 8).unwrap();
        let (pipeline, events) = drive(
            orc,
            events,
            vec![
                PipelineCommand::Capture { duration_secs: 1.0 },
                PipelineCommand::Convert(request),
            ],
        )
        .await;

        assert_eq!(pipeline.state(), PipelineState::Converted);
        assert!(failures(&events).is_empty());
        match events.last() {
            Some(PipelineEvent::Converted { view, request: r }) => {
                assert_eq!(*r, request);
                assert_eq!(view.sample_rate, 8_000);
                assert_eq!(view.bit_depth, BitDepth::Eight);
                assert_eq!(view.num_samples, 8_000);
                let peak = view.spectrum.peak().unwrap();
                assert!((peak.frequency - 440.0).abs() <= 2.0 * view.spectrum.bin_width());
            }
            other => panic!("expected Converted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_duration_fails_and_stays_idle() {
        let (orc, events) = make_orchestrator(one_second_tone());
        let (pipeline, events) = drive(
            orc,
            events,
            vec![PipelineCommand::Capture { duration_secs: 0.0 }],
        )
        .await;

        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(failures(&events), vec![ErrorKind::InvalidDuration]);
    }

    #[tokio::test]
    async fn convert_before_capture_fails() {
        let (orc, events) = make_orchestrator(one_second_tone());
        let (pipeline, events) = drive(
            orc,
            events,
            vec![PipelineCommand::Convert(ConversionRequest::new(8_000, 8).unwrap())],
        )
        .await;

        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(failures(&events), vec![ErrorKind::Conversion]);
    }

    #[tokio::test]
    async fn export_before_convert_fails() {
        let dir = tempdir().expect("temp dir");
        let (orc, events) = make_orchestrator(one_second_tone());
        let (pipeline, events) = drive(
            orc,
            events,
            vec![
                PipelineCommand::Capture { duration_secs: 1.0 },
                PipelineCommand::Export {
                    path: dir.path().join("out.wav"),
                    format: ExportFormat::Wav,
                },
            ],
        )
        .await;

        assert_eq!(pipeline.state(), PipelineState::Captured);
        assert_eq!(failures(&events), vec![ErrorKind::Export]);
    }

    #[tokio::test]
    async fn full_cycle_exports_wav() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("digitized.wav");
        let (orc, events) = make_orchestrator(one_second_tone());
        let (pipeline, events) = drive(
            orc,
            events,
            vec![
                PipelineCommand::Capture { duration_secs: 1.0 },
                PipelineCommand::Convert(ConversionRequest::new(16_000, 16).unwrap()),
                PipelineCommand::Export {
                    path: path.clone(),
                    format: ExportFormat::Wav,
                },
            ],
        )
        .await;

        assert_eq!(pipeline.state(), PipelineState::Converted);
        assert!(failures(&events).is_empty());
        assert_eq!(
            events.last(),
            Some(&PipelineEvent::Exported {
                path: path.clone(),
                format: ExportFormat::Wav
            })
        );
        let reader = hound::WavReader::open(&path).expect("open");
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.len(), 16_000);
    }

    #[tokio::test]
    async fn device_error_reported_as_capture_failure() {
        let device: Arc<dyn CaptureDevice> = Arc::new(MockCapture::err(|| CaptureError::Timeout));
        let (orc, events) = make_orchestrator(device);
        let (pipeline, events) = drive(
            orc,
            events,
            vec![PipelineCommand::Capture { duration_secs: 1.0 }],
        )
        .await;

        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(failures(&events), vec![ErrorKind::Capture]);
    }

    #[tokio::test]
    async fn capture_writes_capture_file() {
        let dir = tempdir().expect("temp dir");
        let file = CaptureFile::new(dir.path().join("temp_recording.wav"));
        let (orc, events) = make_orchestrator(one_second_tone());
        let orc = orc.with_capture_file(file.clone());

        drive(
            orc,
            events,
            vec![PipelineCommand::Capture { duration_secs: 1.0 }],
        )
        .await;

        let reader = hound::WavReader::open(file.path()).expect("capture file");
        assert_eq!(reader.spec().bits_per_sample, 24);
        assert_eq!(reader.len(), 44_100);
    }

    #[tokio::test]
    async fn mel_view_computed_when_enabled() {
        let (event_tx, event_rx) = mpsc::channel(8);
        let mut s = settings();
        s.mel = Some(MelConfig::default());
        let orc = PipelineOrchestrator::new(one_second_tone(), AudioExporter::default(), s, event_tx);

        let (_, events) = drive(
            orc,
            event_rx,
            vec![PipelineCommand::Capture { duration_secs: 1.0 }],
        )
        .await;

        match &events[1] {
            PipelineEvent::Captured(view) => {
                let mel = view.mel.as_ref().expect("mel spectrogram");
                assert_eq!(mel.n_mels(), 128);
                assert_eq!(mel.n_frames(), 1 + 44_100 / 512);
            }
            other => panic!("expected Captured, got {other:?}"),
        }
    }
}

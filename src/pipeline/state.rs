//! Pipeline state machine.
//!
//! [`ConversionPipeline`] owns at most two buffers: the original recording
//! and its digitized copy.  The transitions are:
//!
//! ```text
//! Idle ─────capture──▶ Captured ──convert──▶ Converted
//!                         ▲                      │ ▲
//!                         └──────capture─────────┘ └─convert (re-digitize)
//! export: Converted only, never changes state
//! ```
//!
//! Every failed operation leaves the state exactly as it was.  Buffers are
//! held behind `Arc` so spectra and exports can read a consistent snapshot
//! without copying samples.

use std::path::Path;
use std::sync::Arc;

use crate::audio::{analyze, AudioBuffer, CaptureDevice, SpectrumResult};
use crate::export::{AudioExporter, ExportError, ExportFormat};

use super::convert::{digitize, ConversionError, ConversionRequest};
use super::error::{validate_duration, PipelineError};

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Observable phase of the [`ConversionPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// No recording yet.
    #[default]
    Idle,
    /// An original recording is held; nothing converted since it was taken.
    Captured,
    /// Both the original and a digitized copy are held.
    Converted,
}

impl PipelineState {
    /// A short human-readable label suitable for the UI status bar.
    ///
    /// ```
    /// use audio_digitizer::pipeline::PipelineState;
    ///
    /// assert_eq!(PipelineState::Idle.label(), "Ready to record");
    /// assert_eq!(PipelineState::Converted.label(), "Converted");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Ready to record",
            PipelineState::Captured => "Recorded",
            PipelineState::Converted => "Converted",
        }
    }

    pub fn can_convert(&self) -> bool {
        !matches!(self, PipelineState::Idle)
    }

    pub fn is_exportable(&self) -> bool {
        matches!(self, PipelineState::Converted)
    }
}

// ---------------------------------------------------------------------------
// ConversionPipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
enum Stage {
    #[default]
    Idle,
    Captured {
        original: Arc<AudioBuffer>,
    },
    Converted {
        original: Arc<AudioBuffer>,
        converted: Arc<AudioBuffer>,
        request: ConversionRequest,
    },
}

/// Capture → convert → export state machine.
///
/// ```rust
/// use audio_digitizer::audio::{AudioBuffer, BitDepth};
/// use audio_digitizer::pipeline::{ConversionPipeline, ConversionRequest, PipelineState};
///
/// let mut pipeline = ConversionPipeline::new();
/// let recording = AudioBuffer::new(vec![0.1; 44_100], 44_100, BitDepth::TwentyFour).unwrap();
///
/// pipeline.accept_capture(recording);
/// pipeline.convert(&ConversionRequest::new(8_000, 8).unwrap()).unwrap();
/// assert_eq!(pipeline.state(), PipelineState::Converted);
/// assert_eq!(pipeline.converted().unwrap().len(), 8_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConversionPipeline {
    stage: Stage,
}

impl ConversionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PipelineState {
        match self.stage {
            Stage::Idle => PipelineState::Idle,
            Stage::Captured { .. } => PipelineState::Captured,
            Stage::Converted { .. } => PipelineState::Converted,
        }
    }

    /// Record `duration_secs` seconds at `sample_rate` Hz from `device`.
    ///
    /// The duration is validated before the device is touched.  On success
    /// the recording replaces any previous one and the pipeline is
    /// `Captured`; on failure the state is unchanged.
    pub fn capture(
        &mut self,
        device: &dyn CaptureDevice,
        duration_secs: f32,
        sample_rate: u32,
    ) -> Result<Arc<AudioBuffer>, PipelineError> {
        validate_duration(duration_secs)?;
        let recording = device.capture(duration_secs, sample_rate)?;
        Ok(self.accept_capture(recording))
    }

    /// Install `recording` as the new original, dropping any converted copy.
    ///
    /// An [`AudioBuffer`] always holds at least one sample, so there is no
    /// empty recording to reject here.
    pub fn accept_capture(&mut self, recording: AudioBuffer) -> Arc<AudioBuffer> {
        let original = Arc::new(recording);
        log::info!(
            "pipeline: captured {} samples @ {} Hz ({:.2} s)",
            original.len(),
            original.sample_rate(),
            original.duration_secs()
        );
        self.stage = Stage::Captured {
            original: Arc::clone(&original),
        };
        original
    }

    /// Digitize the original recording per `request`.
    ///
    /// Allowed from `Captured` and from `Converted`; the latter re-digitizes
    /// the same original and replaces the previous converted copy.
    pub fn convert(
        &mut self,
        request: &ConversionRequest,
    ) -> Result<Arc<AudioBuffer>, ConversionError> {
        let original = self.original().ok_or(ConversionError::NothingCaptured)?;
        let converted = Arc::new(digitize(&original, request)?);

        log::info!(
            "pipeline: converted to {} Hz / {} ({} samples)",
            request.target_sample_rate(),
            request.target_bit_depth(),
            converted.len()
        );
        self.stage = Stage::Converted {
            original,
            converted: Arc::clone(&converted),
            request: *request,
        };
        Ok(converted)
    }

    /// Write the converted buffer to `path`.
    pub fn export(
        &self,
        exporter: &AudioExporter,
        path: &Path,
        format: ExportFormat,
    ) -> Result<(), ExportError> {
        let converted = self.converted().ok_or(ExportError::NothingConverted)?;
        exporter.export(&converted, path, format)
    }

    pub fn original(&self) -> Option<Arc<AudioBuffer>> {
        match &self.stage {
            Stage::Idle => None,
            Stage::Captured { original } | Stage::Converted { original, .. } => {
                Some(Arc::clone(original))
            }
        }
    }

    pub fn converted(&self) -> Option<Arc<AudioBuffer>> {
        match &self.stage {
            Stage::Converted { converted, .. } => Some(Arc::clone(converted)),
            _ => None,
        }
    }

    /// Request that produced the current converted buffer.
    pub fn last_request(&self) -> Option<ConversionRequest> {
        match &self.stage {
            Stage::Converted { request, .. } => Some(*request),
            _ => None,
        }
    }

    pub fn analyze_original(&self) -> Option<SpectrumResult> {
        self.original().map(|b| analyze(&b))
    }

    pub fn analyze_converted(&self) -> Option<SpectrumResult> {
        self.converted().map(|b| analyze(&b))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_support::sine_buffer;
    use crate::audio::{BitDepth, CaptureError, MockCapture};
    use crate::pipeline::ErrorKind;
    use tempfile::tempdir;

    fn captured_pipeline() -> ConversionPipeline {
        let mut p = ConversionPipeline::new();
        p.accept_capture(sine_buffer(440.0, 0.5, 44_100, 1.0));
        p
    }

    fn telephone() -> ConversionRequest {
        ConversionRequest::new(8_000, 8).unwrap()
    }

    // ---- PipelineState -----------------------------------------------------

    #[test]
    fn default_state_is_idle() {
        assert_eq!(PipelineState::default(), PipelineState::Idle);
        assert_eq!(ConversionPipeline::new().state(), PipelineState::Idle);
    }

    #[test]
    fn state_permissions() {
        assert!(!PipelineState::Idle.can_convert());
        assert!(PipelineState::Captured.can_convert());
        assert!(PipelineState::Converted.can_convert());
        assert!(!PipelineState::Captured.is_exportable());
        assert!(PipelineState::Converted.is_exportable());
    }

    // ---- capture -----------------------------------------------------------

    #[test]
    fn capture_zero_duration_is_invalid_and_stays_idle() {
        let device = MockCapture::ok(sine_buffer(440.0, 0.5, 44_100, 0.1));
        let mut p = ConversionPipeline::new();

        let err = p.capture(&device, 0.0, 44_100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDuration);
        assert_eq!(p.state(), PipelineState::Idle);
        assert_eq!(device.calls(), 0, "device must not be touched");
    }

    #[test]
    fn capture_moves_to_captured() {
        let device = MockCapture::ok(sine_buffer(440.0, 0.5, 44_100, 0.5));
        let mut p = ConversionPipeline::new();

        let original = p.capture(&device, 0.5, 44_100).unwrap();
        assert_eq!(p.state(), PipelineState::Captured);
        assert_eq!(original.sample_rate(), 44_100);
        assert!(p.converted().is_none());
        assert!(p.analyze_original().is_some());
        assert!(p.analyze_converted().is_none());
    }

    #[test]
    fn device_failure_leaves_state_unchanged() {
        let mut p = captured_pipeline();
        p.convert(&telephone()).unwrap();
        let before = p.converted().unwrap();

        let device = MockCapture::err(|| CaptureError::NoDevice);
        let err = p.capture(&device, 1.0, 44_100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capture);
        assert_eq!(p.state(), PipelineState::Converted);
        assert!(Arc::ptr_eq(&before, &p.converted().unwrap()));
    }

    #[test]
    fn new_capture_discards_converted_buffer() {
        let mut p = captured_pipeline();
        p.convert(&telephone()).unwrap();

        p.accept_capture(sine_buffer(880.0, 0.5, 44_100, 0.2));
        assert_eq!(p.state(), PipelineState::Captured);
        assert!(p.converted().is_none());
        assert!(p.last_request().is_none());
    }

    // ---- convert -----------------------------------------------------------

    #[test]
    fn convert_in_idle_fails_and_stays_idle() {
        let mut p = ConversionPipeline::new();
        assert_eq!(
            p.convert(&telephone()).unwrap_err(),
            ConversionError::NothingCaptured
        );
        assert_eq!(p.state(), PipelineState::Idle);
    }

    #[test]
    fn convert_keeps_original_untouched() {
        let mut p = captured_pipeline();
        let original = p.original().unwrap();

        let converted = p.convert(&telephone()).unwrap();
        assert_eq!(p.state(), PipelineState::Converted);
        assert_eq!(converted.len(), 8_000);
        assert_eq!(converted.bit_depth(), BitDepth::Eight);
        assert!(Arc::ptr_eq(&original, &p.original().unwrap()));
        assert_eq!(p.last_request(), Some(telephone()));
    }

    #[test]
    fn reconvert_replaces_previous_result() {
        let mut p = captured_pipeline();
        p.convert(&telephone()).unwrap();

        let wide = ConversionRequest::new(22_050, 16).unwrap();
        let converted = p.convert(&wide).unwrap();
        assert_eq!(converted.len(), 22_050);
        assert_eq!(converted.bit_depth(), BitDepth::Sixteen);
        assert_eq!(p.last_request(), Some(wide));
    }

    // ---- export ------------------------------------------------------------

    #[test]
    fn export_in_captured_fails() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("out.wav");
        let p = captured_pipeline();

        let err = p
            .export(&AudioExporter::default(), &path, ExportFormat::Wav)
            .unwrap_err();
        assert!(matches!(err, ExportError::NothingConverted));
        assert_eq!(p.state(), PipelineState::Captured);
        assert!(!path.exists());
    }

    #[test]
    fn export_after_convert_writes_file_and_keeps_state() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("out.wav");
        let mut p = captured_pipeline();
        p.convert(&telephone()).unwrap();

        p.export(&AudioExporter::default(), &path, ExportFormat::Wav)
            .expect("export");
        assert!(path.exists());
        assert_eq!(p.state(), PipelineState::Converted);
    }
}

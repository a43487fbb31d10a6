//! Microphone capture via `cpal`, and the temporary capture file.
//!
//! [`CaptureDevice`] is the seam the pipeline records through.
//! [`CpalCapture`] opens the configured (or default) input device for each
//! recording in the device's native sample format, converts frames to `f32`
//! in the cpal callback and collects them over an mpsc channel until the
//! requested duration is reached, then downmixes to mono and resamples to
//! the requested rate if the device runs at another one.
//!
//! [`CaptureFile`] keeps the latest recording on disk as 24-bit PCM WAV and
//! removes it on shutdown.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use thiserror::Error;

use crate::audio::{quantize, resample, stereo_to_mono, AudioBuffer, BitDepth};
use crate::export::{write_wav_file, ExportError};
use crate::pipeline::ConversionError;

/// Extra time allowed for the device to deliver the last frames.
const CAPTURE_GRACE: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while recording from an input device.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("recording duration must be a positive number of seconds, got {0}")]
    InvalidDuration(f32),

    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device `{0}` not found")]
    DeviceNotFound(String),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("input sample format {0} is not supported")]
    UnsupportedSampleFormat(SampleFormat),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("input device stopped delivering audio before the recording finished")]
    Timeout,

    #[error("the recording contains no samples")]
    EmptyRecording,

    #[error("failed to resample the recording: {0}")]
    Resample(#[source] ConversionError),
}

// ---------------------------------------------------------------------------
// CaptureDevice
// ---------------------------------------------------------------------------

/// Source of mono recordings.
///
/// Implementations block for roughly `duration_secs` and return a buffer at
/// `sample_rate` Hz.
pub trait CaptureDevice: Send + Sync {
    fn capture(&self, duration_secs: f32, sample_rate: u32) -> Result<AudioBuffer, CaptureError>;
}

fn validate_duration(duration_secs: f32) -> Result<Duration, CaptureError> {
    if !(duration_secs.is_finite() && duration_secs > 0.0) {
        return Err(CaptureError::InvalidDuration(duration_secs));
    }
    Duration::try_from_secs_f32(duration_secs)
        .map_err(|_| CaptureError::InvalidDuration(duration_secs))
}

// ---------------------------------------------------------------------------
// CpalCapture
// ---------------------------------------------------------------------------

/// Device samples converted to normalised `f32`.
fn to_f32<T>(data: &[T]) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    data.iter().map(|&s| f32::from_sample(s)).collect()
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: mpsc::Sender<Vec<f32>>,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // The receiver is gone once enough frames were collected.
            let _ = tx.send(to_f32(data));
        },
        |err: cpal::StreamError| {
            log::error!("capture: cpal stream error: {err}");
        },
        None,
    )?;
    Ok(stream)
}

/// Microphone capture built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use audio_digitizer::audio::{CaptureDevice, CpalCapture};
///
/// let mic = CpalCapture::new(None); // system default input
/// let recording = mic.capture(2.0, 44_100).unwrap();
/// println!("{} samples", recording.len());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CpalCapture {
    device_name: Option<String>,
}

impl CpalCapture {
    /// `device_name` selects an input device by its cpal name; `None` uses
    /// the host default.
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn open_device(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        match &self.device_name {
            None => host.default_input_device().ok_or(CaptureError::NoDevice),
            Some(wanted) => {
                let devices = host.input_devices().map_err(|e| {
                    log::warn!("capture: cannot enumerate input devices: {e}");
                    CaptureError::DeviceNotFound(wanted.clone())
                })?;
                devices
                    .into_iter()
                    .find(|d| d.name().is_ok_and(|n| &n == wanted))
                    .ok_or_else(|| CaptureError::DeviceNotFound(wanted.clone()))
            }
        }
    }
}

impl CaptureDevice for CpalCapture {
    fn capture(&self, duration_secs: f32, sample_rate: u32) -> Result<AudioBuffer, CaptureError> {
        let duration = validate_duration(duration_secs)?;

        let device = self.open_device()?;
        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let device_rate = supported.sample_rate().0;
        let format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let frames = ((f64::from(duration_secs) * f64::from(device_rate)).round() as usize).max(1);
        let wanted = frames * channels as usize;

        log::info!(
            "capture: recording {duration_secs:.2} s from {} ({device_rate} Hz, {channels} ch, {format})",
            device.name().unwrap_or_else(|_| "<unnamed>".into())
        );

        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, tx)?,
            SampleFormat::F64 => build_stream::<f64>(&device, &config, tx)?,
            SampleFormat::I8 => build_stream::<i8>(&device, &config, tx)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, tx)?,
            SampleFormat::I32 => build_stream::<i32>(&device, &config, tx)?,
            SampleFormat::U8 => build_stream::<u8>(&device, &config, tx)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, tx)?,
            SampleFormat::U32 => build_stream::<u32>(&device, &config, tx)?,
            other => return Err(CaptureError::UnsupportedSampleFormat(other)),
        };
        stream.play()?;

        let deadline = Instant::now() + duration + CAPTURE_GRACE;
        let mut interleaved: Vec<f32> = Vec::with_capacity(wanted);
        while interleaved.len() < wanted {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(chunk) => interleaved.extend_from_slice(&chunk),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    log::warn!(
                        "capture: timed out with {} of {wanted} samples",
                        interleaved.len()
                    );
                    return Err(CaptureError::Timeout);
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        drop(stream);

        interleaved.truncate(wanted);
        let mono = stereo_to_mono(&interleaved, channels);
        let recording = AudioBuffer::new(mono, device_rate, BitDepth::TwentyFour)
            .map_err(|_| CaptureError::EmptyRecording)?;

        if device_rate == sample_rate {
            return Ok(recording);
        }
        log::debug!("capture: device rate {device_rate} Hz, resampling to {sample_rate} Hz");
        resample(&recording, sample_rate).map_err(CaptureError::Resample)
    }
}

// ---------------------------------------------------------------------------
// CaptureFile
// ---------------------------------------------------------------------------

/// The on-disk copy of the most recent recording.
#[derive(Debug, Clone)]
pub struct CaptureFile {
    path: PathBuf,
}

impl CaptureFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `buffer` as 24-bit PCM WAV, creating the parent directory.
    pub fn write(&self, buffer: &AudioBuffer) -> Result<(), ExportError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let pcm24 = if buffer.bit_depth() == BitDepth::TwentyFour {
            buffer.clone()
        } else {
            quantize(buffer, BitDepth::TwentyFour)
        };
        write_wav_file(&pcm24, &self.path)?;
        log::debug!("capture: saved {}", self.path.display());
        Ok(())
    }

    /// Delete the file. A file that does not exist is not an error.
    pub fn remove(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("capture: removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// MockCapture  (test-only)
// ---------------------------------------------------------------------------

/// A test double that hands out a fixed recording (or error) and counts how
/// often it was asked.
#[cfg(test)]
pub struct MockCapture {
    response: Result<AudioBuffer, fn() -> CaptureError>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockCapture {
    /// Always return `buffer`.
    pub fn ok(buffer: AudioBuffer) -> Self {
        Self {
            response: Ok(buffer),
            calls: Default::default(),
        }
    }

    /// Always fail with the error built by `make`.
    pub fn err(make: fn() -> CaptureError) -> Self {
        Self {
            response: Err(make),
            calls: Default::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl CaptureDevice for MockCapture {
    fn capture(&self, duration_secs: f32, sample_rate: u32) -> Result<AudioBuffer, CaptureError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        validate_duration(duration_secs)?;
        let buffer = self.response.as_ref().map_err(|make| make())?;
        resample(buffer, sample_rate).map_err(CaptureError::Resample)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_support::sine_buffer;
    use crate::audio::to_pcm_i32;
    use tempfile::tempdir;

    #[test]
    fn integer_device_samples_are_normalised() {
        assert_eq!(to_f32(&[i16::MIN, 0, 16_384]), vec![-1.0, 0.0, 0.5]);
        assert_eq!(to_f32(&[0_u16, 32_768]), vec![-1.0, 0.0]);
        assert_eq!(to_f32(&[i8::MIN, 0]), vec![-1.0, 0.0]);
        assert_eq!(to_f32(&[0.25_f32, -0.75]), vec![0.25, -0.75]);
    }

    #[test]
    fn non_positive_or_non_finite_durations_rejected() {
        for bad in [0.0_f32, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                validate_duration(bad),
                Err(CaptureError::InvalidDuration(_))
            ));
        }
        assert_eq!(validate_duration(1.5).unwrap(), Duration::from_millis(1_500));
    }

    #[test]
    fn cpal_capture_rejects_bad_duration_before_opening_device() {
        let mic = CpalCapture::new(Some("nonexistent device".into()));
        assert!(matches!(
            mic.capture(0.0, 44_100),
            Err(CaptureError::InvalidDuration(_))
        ));
    }

    #[test]
    fn capture_device_is_object_safe_and_shareable() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn CaptureDevice>();
        assert_send_sync::<CpalCapture>();
    }

    #[test]
    fn mock_resamples_to_requested_rate() {
        let mock = MockCapture::ok(sine_buffer(440.0, 0.5, 44_100, 0.5));
        let buf = mock.capture(0.5, 22_050).unwrap();
        assert_eq!(buf.sample_rate(), 22_050);
        assert_eq!(mock.calls(), 1);
    }

    // ---- CaptureFile -------------------------------------------------------

    #[test]
    fn capture_file_is_24_bit_wav() {
        let dir = tempdir().expect("temp dir");
        let file = CaptureFile::new(dir.path().join("cache").join("temp_recording.wav"));
        let recording = sine_buffer(440.0, 0.5, 44_100, 0.1);

        file.write(&recording).expect("write");

        let mut reader = hound::WavReader::open(file.path()).expect("open");
        assert_eq!(reader.spec().bits_per_sample, 24);
        assert_eq!(reader.spec().sample_rate, 44_100);
        let samples: Vec<i32> = reader.samples::<i32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, to_pcm_i32(&recording));
    }

    #[test]
    fn capture_file_remove_is_idempotent() {
        let dir = tempdir().expect("temp dir");
        let file = CaptureFile::new(dir.path().join("temp_recording.wav"));

        file.write(&sine_buffer(440.0, 0.5, 8_000, 0.05)).expect("write");
        assert!(file.path().exists());

        file.remove().expect("first remove");
        assert!(!file.path().exists());
        file.remove().expect("removing a missing file is fine");
    }
}

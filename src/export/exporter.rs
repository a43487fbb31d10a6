//! Export formats, errors and the [`AudioExporter`] front end.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::audio::AudioBuffer;
use crate::config::ExportConfig;

// ---------------------------------------------------------------------------
// ExportError
// ---------------------------------------------------------------------------

/// Errors raised while writing a buffer to disk.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export format `{0}` (expected .wav or .mp3)")]
    UnsupportedFormat(String),

    #[error("nothing to export: convert a recording first")]
    NothingConverted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("MP3 encoder `{0}` not found; install ffmpeg or set export.ffmpeg_path")]
    EncoderUnavailable(String),

    #[error("MP3 encoder exited with {status}: {stderr}")]
    Encoder { status: String, stderr: String },
}

// ---------------------------------------------------------------------------
// ExportFormat
// ---------------------------------------------------------------------------

/// Container written by [`AudioExporter::export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Wav,
    Mp3,
}

impl ExportFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
        }
    }

    /// Pick the format from `path`'s extension (case-insensitive).
    ///
    /// ```
    /// use audio_digitizer::export::ExportFormat;
    ///
    /// assert_eq!(ExportFormat::from_path("take1.WAV".as_ref()).unwrap(), ExportFormat::Wav);
    /// assert!(ExportFormat::from_path("take1.flac".as_ref()).is_err());
    /// ```
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ExportError::UnsupportedFormat(path.display().to_string()))?;
        ext.parse()
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalised.as_str() {
            "wav" => Ok(ExportFormat::Wav),
            "mp3" => Ok(ExportFormat::Mp3),
            _ => Err(ExportError::UnsupportedFormat(s.trim().to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Wav => "WAV",
            ExportFormat::Mp3 => "MP3",
        })
    }
}

// ---------------------------------------------------------------------------
// AudioExporter
// ---------------------------------------------------------------------------

/// Writes buffers as WAV (in-process) or MP3 (through an `ffmpeg` child
/// process).
#[derive(Debug, Clone)]
pub struct AudioExporter {
    ffmpeg_path: PathBuf,
    mp3_bitrate_kbps: u32,
}

impl AudioExporter {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, mp3_bitrate_kbps: u32) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            mp3_bitrate_kbps,
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(&config.ffmpeg_path, config.mp3_bitrate_kbps)
    }

    /// Write `buffer` to `path` as `format`.
    ///
    /// WAV output stores the buffer's own bit depth and sample rate; the
    /// integer samples are exactly [`to_pcm_i32`](crate::audio::to_pcm_i32)
    /// of the buffer.
    pub fn export(
        &self,
        buffer: &AudioBuffer,
        path: &Path,
        format: ExportFormat,
    ) -> Result<(), ExportError> {
        match format {
            ExportFormat::Wav => super::wav::write_wav_file(buffer, path)?,
            ExportFormat::Mp3 => {
                super::mp3::encode_mp3(buffer, path, &self.ffmpeg_path, self.mp3_bitrate_kbps)?
            }
        }

        log::info!(
            "export: wrote {format} {} ({} Hz, {}, {:.2} s)",
            path.display(),
            buffer.sample_rate(),
            buffer.bit_depth(),
            buffer.duration_secs()
        );
        Ok(())
    }
}

impl Default for AudioExporter {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

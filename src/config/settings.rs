//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a settings file only needs the
//! keys it wants to override.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::{BitDepth, MelConfig};

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Microphone recording settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Rate the original recording is delivered at, in Hz.
    pub sample_rate: u32,
    /// Value pre-filled in the duration field.
    pub default_duration_secs: f32,
    /// File name of the temporary capture inside the cache directory.
    pub temp_file_name: String,
    /// Audio input device name; `None` means the system default.
    pub input_device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            default_duration_secs: 5.0,
            temp_file_name: "temp_recording.wav".into(),
            input_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ConversionConfig
// ---------------------------------------------------------------------------

/// Choices offered in the sample-rate and bit-depth combo boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub sample_rate_choices: Vec<u32>,
    pub default_sample_rate: u32,
    /// Stored as plain integers (`[16, 8]`).
    pub bit_depth_choices: Vec<BitDepth>,
    pub default_bit_depth: BitDepth,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            sample_rate_choices: vec![44_100, 22_050, 16_000, 8_000],
            default_sample_rate: 22_050,
            bit_depth_choices: vec![BitDepth::Sixteen, BitDepth::Eight],
            default_bit_depth: BitDepth::Sixteen,
        }
    }
}

// ---------------------------------------------------------------------------
// SpectrumConfig
// ---------------------------------------------------------------------------

/// Display settings for the two spectrum plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Upper bound on plotted points per spectrum.
    pub display_points: usize,
    /// Start in mel spectrogram view instead of the magnitude spectrum.
    pub show_mel: bool,
    pub mel: MelConfig,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            display_points: 2048,
            show_mel: false,
            mel: MelConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExportConfig
// ---------------------------------------------------------------------------

/// WAV / MP3 export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// `ffmpeg` executable used for MP3 encoding; a bare name is looked up
    /// on `PATH`.
    pub ffmpeg_path: String,
    pub mp3_bitrate_kbps: u32,
    /// Value pre-filled in the export path field.
    pub default_file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".into(),
            mp3_bitrate_kbps: 192,
            default_file_name: "digitized.wav".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// eframe window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial inner window size `(width, height)` in points.
    pub window_size: (f32, f32),
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (1700.0, 800.0),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use audio_digitizer::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub conversion: ConversionConfig,
    pub spectrum: SpectrumConfig,
    pub export: ExportConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Signal processing core: capture → resample → quantize → analyze.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → stereo_to_mono → AudioBuffer (original)
//!           → resample(target_rate) → quantize(target_bits) → AudioBuffer (digitized)
//!           → analyze / MelSpectrogram::compute → plots
//! ```
//!
//! Everything except [`capture`] is pure: functions take a buffer by
//! reference and return a new one.
//!
//! # Quick Start
//!
//! ```rust
//! use audio_digitizer::audio::{analyze, quantize, resample, AudioBuffer, BitDepth};
//!
//! let samples: Vec<f32> = (0..44_100)
//!     .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44_100.0).sin())
//!     .collect();
//! let original = AudioBuffer::new(samples, 44_100, BitDepth::TwentyFour).unwrap();
//!
//! let digitized = quantize(&resample(&original, 8_000).unwrap(), BitDepth::Eight);
//! assert_eq!(digitized.len(), 8_000);
//!
//! let peak = analyze(&digitized).peak().unwrap();
//! assert!((peak.frequency - 440.0).abs() <= 1.0);
//! ```

pub mod buffer;
pub mod capture;
pub mod mel;
pub mod quantize;
pub mod resample;
pub mod spectrum;

pub use buffer::{AudioBuffer, BitDepth, BufferError};
pub use capture::{CaptureDevice, CaptureError, CaptureFile, CpalCapture};
pub use mel::{hz_to_mel, mel_to_hz, MelConfig, MelSpectrogram};
pub use quantize::{quantize, to_pcm_i32};
pub use resample::{output_len, resample, stereo_to_mono};
pub use spectrum::{analyze, SpectrumBin, SpectrumResult};

// test-only re-export so the pipeline tests can use the mock device without
// reaching into `audio::capture`.
#[cfg(test)]
pub use capture::MockCapture;

//! Audio digitizer: record from a microphone, simulate analog-to-digital
//! conversion by resampling and requantizing, compare spectra, export.
//!
//! * [`audio`]: buffers, resampling, quantization, spectral analysis, capture.
//! * [`pipeline`]: the capture → convert → export state machine and its
//!   async orchestrator.
//! * [`export`]: WAV (hound) and MP3 (ffmpeg) writers.
//! * [`config`]: TOML settings and platform paths.
//! * [`app`]: the eframe window.

pub mod app;
pub mod audio;
pub mod config;
pub mod export;
pub mod pipeline;

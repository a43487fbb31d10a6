//! Mel-scaled log-power spectrogram.
//!
//! A richer alternative to the flat [`analyze`](crate::audio::analyze)
//! spectrum: a centred short-time FFT (periodic Hann window) is mapped
//! through a triangular mel filterbank and converted to decibels relative
//! to the loudest cell.
//!
//! ```text
//! samples ─▶ zero-pad n_fft/2 ─▶ frame (hop) ─▶ Hann ─▶ |FFT|² ─▶ mel bank ─▶ dB
//! ```

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::audio::AudioBuffer;

/// Power floor before taking the logarithm.
const AMIN: f32 = 1e-10;

// ---------------------------------------------------------------------------
// MelConfig
// ---------------------------------------------------------------------------

/// Parameters of the mel spectrogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelConfig {
    /// FFT window length in samples.
    pub n_fft: usize,
    /// Samples between successive frames.
    pub hop_length: usize,
    /// Number of mel bands.
    pub n_mels: usize,
    /// Lowest filter edge in Hz.
    pub f_min: f32,
    /// Highest filter edge in Hz; `None` means Nyquist.
    pub f_max: Option<f32>,
    /// Dynamic range kept below the loudest cell, in dB.
    pub top_db: f32,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            f_min: 0.0,
            f_max: None,
            top_db: 80.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Mel scale
// ---------------------------------------------------------------------------

pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10_f32.powf(mel / 2595.0) - 1.0)
}

/// `n_mels + 2` filter edge frequencies evenly spaced on the mel scale.
fn mel_edges(n_mels: usize, f_min: f32, f_max: f32) -> Vec<f32> {
    let lo = hz_to_mel(f_min);
    let hi = hz_to_mel(f_max);
    let steps = (n_mels + 1) as f32;
    (0..n_mels + 2)
        .map(|i| mel_to_hz(lo + (hi - lo) * i as f32 / steps))
        .collect()
}

/// Triangular filter weights, `n_mels` rows of `n_fft/2 + 1` columns.
///
/// Each triangle is area-normalised (Slaney) so bands of different widths
/// contribute comparable energy.
fn filterbank(sample_rate: u32, n_fft: usize, edges: &[f32]) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let bin_hz = sample_rate as f32 / n_fft as f32;

    edges
        .windows(3)
        .map(|w| {
            let (left, centre, right) = (w[0], w[1], w[2]);
            let norm = 2.0 / (right - left).max(f32::EPSILON);
            (0..n_bins)
                .map(|k| {
                    let f = k as f32 * bin_hz;
                    let rising = (f - left) / (centre - left).max(f32::EPSILON);
                    let falling = (right - f) / (right - centre).max(f32::EPSILON);
                    rising.min(falling).max(0.0) * norm
                })
                .collect()
        })
        .collect()
}

/// Periodic Hann window.
fn hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / len as f32).cos()))
        .collect()
}

// ---------------------------------------------------------------------------
// MelSpectrogram
// ---------------------------------------------------------------------------

/// Log-power mel spectrogram, time-major.
#[derive(Debug, Clone, PartialEq)]
pub struct MelSpectrogram {
    /// `frames[t][m]` is the level of mel band `m` at frame `t`, in dB,
    /// within `[-top_db, 0]`.
    pub frames: Vec<Vec<f32>>,
    /// Centre frequency of each mel band in Hz.
    pub band_frequencies: Vec<f32>,
    pub hop_length: usize,
    pub sample_rate: u32,
    pub top_db: f32,
}

impl MelSpectrogram {
    /// Compute the spectrogram of `buffer`.
    ///
    /// The signal is zero-padded by `n_fft / 2` on both sides so frame `t`
    /// is centred on sample `t * hop_length`; the frame count is
    /// `1 + (len + 2 * (n_fft / 2) - n_fft) / hop_length`.
    ///
    /// Degenerate settings are clamped rather than rejected: `n_fft`,
    /// `hop_length` and `n_mels` are at least 1, `f_max` lies in
    /// `0..=nyquist` and `f_min` in `0..=f_max`.
    pub fn compute(buffer: &AudioBuffer, config: &MelConfig) -> Self {
        let n_fft = config.n_fft.max(2);
        let hop = config.hop_length.max(1);
        let n_mels = config.n_mels.max(1);
        let sample_rate = buffer.sample_rate();
        let nyquist = sample_rate as f32 / 2.0;
        let f_max = config.f_max.unwrap_or(nyquist).min(nyquist).max(0.0);
        let f_min = config.f_min.max(0.0).min(f_max);

        let pad = n_fft / 2;
        let mut padded = vec![0.0_f32; pad];
        padded.extend_from_slice(buffer.samples());
        padded.resize(padded.len() + pad, 0.0);
        if padded.len() < n_fft {
            padded.resize(n_fft, 0.0);
        }

        let edges = mel_edges(n_mels, f_min, f_max);
        let bank = filterbank(sample_rate, n_fft, &edges);
        let window = hann(n_fft);

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let mut scratch = vec![Complex::new(0.0_f32, 0.0); n_fft];

        let n_frames = 1 + (padded.len() - n_fft) / hop;
        let mut power_frames: Vec<Vec<f32>> = Vec::with_capacity(n_frames);

        for t in 0..n_frames {
            let start = t * hop;
            for (slot, (&s, &w)) in scratch
                .iter_mut()
                .zip(padded[start..start + n_fft].iter().zip(&window))
            {
                *slot = Complex::new(s * w, 0.0);
            }
            fft.process(&mut scratch);

            let power: Vec<f32> = scratch[..n_fft / 2 + 1]
                .iter()
                .map(|c| c.norm_sqr())
                .collect();

            let mel: Vec<f32> = bank
                .iter()
                .map(|row| row.iter().zip(&power).map(|(w, p)| w * p).sum())
                .collect();
            power_frames.push(mel);
        }

        let reference = power_frames
            .iter()
            .flatten()
            .copied()
            .fold(AMIN, f32::max);
        let top_db = config.top_db.abs();

        let frames = power_frames
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|p| (10.0 * (p.max(AMIN) / reference).log10()).max(-top_db))
                    .collect()
            })
            .collect();

        log::debug!(
            "mel: {n_frames} frames x {n_mels} bands (n_fft {n_fft}, hop {hop}) @ {sample_rate} Hz"
        );

        Self {
            frames,
            band_frequencies: edges[1..=n_mels].to_vec(),
            hop_length: hop,
            sample_rate,
            top_db,
        }
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn n_mels(&self) -> usize {
        self.band_frequencies.len()
    }

    /// Start time of frame `t` in seconds (frame centre, given centred
    /// framing).
    pub fn frame_time(&self, t: usize) -> f32 {
        (t * self.hop_length) as f32 / self.sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

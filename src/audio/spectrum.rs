//! FFT magnitude spectrum of a whole buffer.
//!
//! [`analyze`] runs one full-length forward FFT over the buffer (rustfft
//! plans mixed-radix / Bluestein transforms, so any length works without
//! padding) and keeps the non-negative half: bins `0 ..= n/2`, from 0 Hz to
//! Nyquist.
//!
//! The presentation layer plots [`SpectrumResult::decimate`]d copies; the
//! core never draws.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::audio::AudioBuffer;

// ---------------------------------------------------------------------------
// SpectrumResult
// ---------------------------------------------------------------------------

/// One `(frequency, magnitude)` point of a spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumBin {
    /// Bin centre in Hz.
    pub frequency: f32,
    /// Unnormalised FFT magnitude `|X_k|`.
    pub magnitude: f32,
}

/// Magnitude spectrum from 0 Hz to Nyquist, frequencies strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumResult {
    pub sample_rate: u32,
    pub bins: Vec<SpectrumBin>,
    /// Number of samples the transform was computed over.
    pub fft_len: usize,
}

impl SpectrumResult {
    /// Frequency spacing between adjacent bins.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.fft_len as f32
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Bin with the largest magnitude.
    pub fn peak(&self) -> Option<SpectrumBin> {
        self.bins
            .iter()
            .copied()
            .max_by(|a, b| a.magnitude.total_cmp(&b.magnitude))
    }

    /// Largest magnitude, `0.0` for an empty spectrum.
    pub fn max_magnitude(&self) -> f32 {
        self.peak().map(|b| b.magnitude).unwrap_or(0.0)
    }

    /// Reduce to at most `max_points` bins for plotting.
    ///
    /// Bins are grouped into equal runs and each run is represented by its
    /// loudest member, so narrow peaks survive the reduction.  Returns a
    /// clone when the spectrum is already small enough or `max_points == 0`.
    pub fn decimate(&self, max_points: usize) -> SpectrumResult {
        if max_points == 0 || self.bins.len() <= max_points {
            return self.clone();
        }

        let group = self.bins.len().div_ceil(max_points);
        let bins = self
            .bins
            .chunks(group)
            .filter_map(|run| {
                run.iter()
                    .copied()
                    .max_by(|a, b| a.magnitude.total_cmp(&b.magnitude))
            })
            .collect();

        SpectrumResult {
            sample_rate: self.sample_rate,
            bins,
            fft_len: self.fft_len,
        }
    }
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

/// Compute the magnitude spectrum of `buffer`.
///
/// # Example
///
/// ```rust
/// use audio_digitizer::audio::{analyze, AudioBuffer, BitDepth};
///
/// // 1 kHz sine, 8 kHz sample rate, 0.1 s
/// let samples: Vec<f32> = (0..800)
///     .map(|i| (2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / 8_000.0).sin())
///     .collect();
/// let buf = AudioBuffer::new(samples, 8_000, BitDepth::Sixteen).unwrap();
///
/// let spectrum = analyze(&buf);
/// assert_eq!(spectrum.bins.len(), 401); // 0 ..= n/2
/// assert!((spectrum.peak().unwrap().frequency - 1_000.0).abs() <= spectrum.bin_width());
/// ```
pub fn analyze(buffer: &AudioBuffer) -> SpectrumResult {
    let n = buffer.len();
    let mut data: Vec<Complex<f32>> = buffer
        .samples()
        .iter()
        .map(|&s| Complex::new(s, 0.0))
        .collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut data);

    let sample_rate = buffer.sample_rate();
    let bin_hz = sample_rate as f32 / n as f32;
    let bins = data
        .iter()
        .take(n / 2 + 1)
        .enumerate()
        .map(|(k, c)| SpectrumBin {
            frequency: k as f32 * bin_hz,
            magnitude: c.norm(),
        })
        .collect();

    log::debug!("spectrum: {n}-point FFT @ {sample_rate} Hz");

    SpectrumResult {
        sample_rate,
        bins,
        fft_len: n,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

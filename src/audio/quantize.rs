//! Requantization onto a signed integer PCM grid.
//!
//! [`quantize`] snaps every sample to the nearest level of a
//! `target_bits`-wide grid and stores the result renormalised back to
//! `f32`, so later stages (analysis, export) keep working in floating
//! point.  Samples outside `[-1.0, 1.0]` (resampler overshoot) are clipped,
//! never wrapped.  No dither is added.
//!
//! # Example
//!
//! ```rust
//! use audio_digitizer::audio::{quantize, AudioBuffer, BitDepth};
//!
//! let buf = AudioBuffer::new(vec![0.3, -1.2, 0.999], 44_100, BitDepth::TwentyFour).unwrap();
//! let q = quantize(&buf, BitDepth::Eight);
//! assert_eq!(q.bit_depth(), BitDepth::Eight);
//! assert_eq!(q.samples()[1], -1.0); // clipped
//! assert_eq!(quantize(&q, BitDepth::Eight), q); // idempotent
//! ```

use crate::audio::{AudioBuffer, BitDepth};

/// Nearest grid level for `sample` at `depth`, after clipping.
fn level(sample: f32, depth: BitDepth) -> i32 {
    let max = f64::from(depth.max_level());
    (f64::from(sample).clamp(-1.0, 1.0) * max).round() as i32
}

/// Requantize `buffer` to `target_bits`.
///
/// Each output sample is `round(clip(s) * max) / max` where
/// `max = 2^(bits-1) - 1`.  Applying the same depth twice yields
/// bit-identical samples.
pub fn quantize(buffer: &AudioBuffer, target_bits: BitDepth) -> AudioBuffer {
    let max = f64::from(target_bits.max_level());
    let samples: Vec<f32> = buffer
        .samples()
        .iter()
        .map(|&s| (f64::from(level(s, target_bits)) / max) as f32)
        .collect();

    let clipped = buffer
        .samples()
        .iter()
        .filter(|s| s.abs() > 1.0)
        .count();
    if clipped > 0 {
        log::debug!("quantize: clipped {clipped} samples outside [-1, 1]");
    }

    buffer.with_samples(samples, target_bits)
}

/// Integer grid values of `buffer` at its own bit depth.
///
/// For a buffer produced by [`quantize`] this recovers the exact levels that
/// were chosen, which is what the WAV writer stores.
pub fn to_pcm_i32(buffer: &AudioBuffer) -> Vec<i32> {
    let depth = buffer.bit_depth();
    buffer.samples().iter().map(|&s| level(s, depth)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

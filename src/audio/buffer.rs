//! In-memory mono PCM buffer and the closed set of supported bit depths.
//!
//! An [`AudioBuffer`] is created once per capture and never mutated after
//! construction.  Every processing step (resample, quantize) returns a new
//! buffer, so the original recording and the digitized copy can be read
//! side by side.
//!
//! # Example
//!
//! ```rust
//! use audio_digitizer::audio::{AudioBuffer, BitDepth};
//!
//! let buf = AudioBuffer::new(vec![0.0, 0.5, -0.5, 0.25], 8_000, BitDepth::Sixteen).unwrap();
//! assert_eq!(buf.len(), 4);
//! assert!((buf.duration_secs() - 0.0005).abs() < 1e-9);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::ConversionError;

// ---------------------------------------------------------------------------
// BufferError
// ---------------------------------------------------------------------------

/// Reasons an [`AudioBuffer`] cannot be constructed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BufferError {
    #[error("audio buffer must contain at least one sample")]
    Empty,

    #[error("sample rate must be greater than 0 Hz")]
    ZeroSampleRate,
}

// ---------------------------------------------------------------------------
// BitDepth
// ---------------------------------------------------------------------------

/// Bits per sample of a signed integer PCM grid.
///
/// Raw widths coming from the UI or the settings file are validated through
/// [`TryFrom<u32>`] / [`FromStr`]; anything outside this set is rejected with
/// [`ConversionError::UnsupportedBitDepth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BitDepth {
    Eight,
    Sixteen,
    TwentyFour,
}

impl BitDepth {
    /// Every supported depth, narrowest first.
    pub const ALL: [BitDepth; 3] = [BitDepth::Eight, BitDepth::Sixteen, BitDepth::TwentyFour];

    /// Width of one sample in bits.
    pub fn bits(self) -> u32 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
            BitDepth::TwentyFour => 24,
        }
    }

    /// Largest positive grid value, `2^(bits-1) - 1`.
    ///
    /// ```
    /// use audio_digitizer::audio::BitDepth;
    ///
    /// assert_eq!(BitDepth::Eight.max_level(), 127);
    /// assert_eq!(BitDepth::Sixteen.max_level(), 32_767);
    /// assert_eq!(BitDepth::TwentyFour.max_level(), 8_388_607);
    /// ```
    pub fn max_level(self) -> i32 {
        (1_i32 << (self.bits() - 1)) - 1
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = ConversionError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            24 => Ok(BitDepth::TwentyFour),
            other => Err(ConversionError::UnsupportedBitDepth(other.to_string())),
        }
    }
}

impl From<BitDepth> for u32 {
    fn from(depth: BitDepth) -> Self {
        depth.bits()
    }
}

impl FromStr for BitDepth {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<u32>()
            .map_err(|_| ConversionError::UnsupportedBitDepth(trimmed.to_string()))
            .and_then(BitDepth::try_from)
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

// ---------------------------------------------------------------------------
// AudioBuffer
// ---------------------------------------------------------------------------

/// Mono `f32` PCM samples with their sample rate and bit depth.
///
/// Samples are nominally in `[-1.0, 1.0]`; resampling may overshoot
/// slightly, which the quantizer clips.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    bit_depth: BitDepth,
}

impl AudioBuffer {
    /// Build a buffer.
    ///
    /// # Errors
    ///
    /// [`BufferError::Empty`] when `samples` is empty and
    /// [`BufferError::ZeroSampleRate`] when `sample_rate == 0`.
    pub fn new(
        samples: Vec<f32>,
        sample_rate: u32,
        bit_depth: BitDepth,
    ) -> Result<Self, BufferError> {
        if samples.is_empty() {
            return Err(BufferError::Empty);
        }
        if sample_rate == 0 {
            return Err(BufferError::ZeroSampleRate);
        }
        Ok(Self {
            samples,
            sample_rate,
            bit_depth,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Number of samples (always at least 1).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`; kept for the `len`/`is_empty` convention.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Root-mean-square amplitude.
    pub fn rms(&self) -> f32 {
        let mean_sq = self
            .samples
            .iter()
            .map(|&s| f64::from(s) * f64::from(s))
            .sum::<f64>()
            / self.samples.len() as f64;
        mean_sq.sqrt() as f32
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
    }

    /// Sample-for-sample replacement keeping the sample rate.
    pub(crate) fn with_samples(&self, samples: Vec<f32>, bit_depth: BitDepth) -> Self {
        debug_assert_eq!(samples.len(), self.samples.len());
        Self {
            samples,
            sample_rate: self.sample_rate,
            bit_depth,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_samples_rejected() {
        let err = AudioBuffer::new(Vec::new(), 44_100, BitDepth::Sixteen).unwrap_err();
        assert_eq!(err, BufferError::Empty);
    }

    #[test]
    fn zero_sample_rate_rejected() {
        let err = AudioBuffer::new(vec![0.0], 0, BitDepth::Sixteen).unwrap_err();
        assert_eq!(err, BufferError::ZeroSampleRate);
    }

    #[test]
    fn duration_from_len_and_rate() {
        let buf = AudioBuffer::new(vec![0.0; 22_050], 44_100, BitDepth::Sixteen).unwrap();
        assert!((buf.duration_secs() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rms_and_peak_of_constant_signal() {
        let buf = AudioBuffer::new(vec![-0.5; 100], 8_000, BitDepth::Eight).unwrap();
        assert!((buf.rms() - 0.5).abs() < 1e-6);
        assert!((buf.peak() - 0.5).abs() < 1e-6);
    }

    // ---- BitDepth ----------------------------------------------------------

    #[test]
    fn supported_bit_depths_parse() {
        assert_eq!(BitDepth::try_from(8).unwrap(), BitDepth::Eight);
        assert_eq!(BitDepth::try_from(16).unwrap(), BitDepth::Sixteen);
        assert_eq!(BitDepth::try_from(24).unwrap(), BitDepth::TwentyFour);
        assert_eq!(" 16 ".parse::<BitDepth>().unwrap(), BitDepth::Sixteen);
    }

    #[test]
    fn unsupported_bit_depths_rejected() {
        for bad in [0_u32, 1, 12, 32] {
            assert!(matches!(
                BitDepth::try_from(bad),
                Err(ConversionError::UnsupportedBitDepth(_))
            ));
        }
        assert!(matches!(
            "sixteen".parse::<BitDepth>(),
            Err(ConversionError::UnsupportedBitDepth(_))
        ));
    }

    #[test]
    fn bit_depth_round_trips_through_u32() {
        for depth in BitDepth::ALL {
            assert_eq!(BitDepth::try_from(u32::from(depth)).unwrap(), depth);
        }
    }

    #[test]
    fn bit_depth_display() {
        assert_eq!(BitDepth::TwentyFour.to_string(), "24-bit");
    }
}

//! Conversion requests and the resample → quantize step.

use thiserror::Error;

use crate::audio::{quantize, resample, AudioBuffer, BitDepth, BufferError};

/// Highest target sample rate accepted from the UI or settings.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

// ---------------------------------------------------------------------------
// ConversionError
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConversionError {
    #[error("invalid sample rate {0} Hz (expected 1 to {MAX_SAMPLE_RATE} Hz)")]
    InvalidSampleRate(u32),

    #[error("unsupported bit depth `{0}` (expected 8, 16 or 24)")]
    UnsupportedBitDepth(String),

    #[error("nothing to convert: record audio first")]
    NothingCaptured,

    #[error("resampler error: {0}")]
    Resampler(String),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

// ---------------------------------------------------------------------------
// ConversionRequest
// ---------------------------------------------------------------------------

/// Target format of one digitization.
///
/// Only constructible through [`new`](Self::new) / [`parse`](Self::parse),
/// so a request in hand always has a rate in `1..=MAX_SAMPLE_RATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversionRequest {
    target_sample_rate: u32,
    target_bit_depth: BitDepth,
}

impl ConversionRequest {
    /// Build a request from raw integers.
    ///
    /// ```
    /// use audio_digitizer::audio::BitDepth;
    /// use audio_digitizer::pipeline::ConversionRequest;
    ///
    /// let req = ConversionRequest::new(8_000, 8).unwrap();
    /// assert_eq!(req.target_bit_depth(), BitDepth::Eight);
    /// assert!(ConversionRequest::new(0, 16).is_err());
    /// assert!(ConversionRequest::new(8_000, 12).is_err());
    /// ```
    pub fn new(target_sample_rate: u32, target_bits: u32) -> Result<Self, ConversionError> {
        Self::with_depth(target_sample_rate, BitDepth::try_from(target_bits)?)
    }

    /// Build a request from an already validated bit depth.
    pub fn with_depth(
        target_sample_rate: u32,
        target_bit_depth: BitDepth,
    ) -> Result<Self, ConversionError> {
        if target_sample_rate == 0 || target_sample_rate > MAX_SAMPLE_RATE {
            return Err(ConversionError::InvalidSampleRate(target_sample_rate));
        }
        Ok(Self {
            target_sample_rate,
            target_bit_depth,
        })
    }

    /// Build a request from the text of the two combo boxes.
    pub fn parse(rate: &str, bits: &str) -> Result<Self, ConversionError> {
        let rate: u32 = rate
            .trim()
            .parse()
            .map_err(|_| ConversionError::InvalidSampleRate(0))?;
        Self::with_depth(rate, bits.parse()?)
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    pub fn target_bit_depth(&self) -> BitDepth {
        self.target_bit_depth
    }
}

/// Resample `original` to the requested rate, then requantize it to the
/// requested depth.
pub fn digitize(
    original: &AudioBuffer,
    request: &ConversionRequest,
) -> Result<AudioBuffer, ConversionError> {
    let resampled = resample(original, request.target_sample_rate())?;
    Ok(quantize(&resampled, request.target_bit_depth()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

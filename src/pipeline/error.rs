//! User-facing pipeline errors.

use std::fmt;

use thiserror::Error;

use crate::audio::CaptureError;
use crate::export::ExportError;

use super::ConversionError;

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Every failure the pipeline reports to the presentation layer.
///
/// The four user-visible categories wrap the module error that caused them;
/// `Internal` covers a worker task that died before returning.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidDuration(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidDuration(_) => ErrorKind::InvalidDuration,
            PipelineError::Capture(_) => ErrorKind::Capture,
            PipelineError::Conversion(_) => ErrorKind::Conversion,
            PipelineError::Export(_) => ErrorKind::Export,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Category of a [`PipelineError`], carried in events so the UI can title
/// its error message without holding the error itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidDuration,
    Capture,
    Conversion,
    Export,
    Internal,
}

impl ErrorKind {
    pub fn title(self) -> &'static str {
        match self {
            ErrorKind::InvalidDuration => "Invalid duration",
            ErrorKind::Capture => "Recording failed",
            ErrorKind::Conversion => "Conversion failed",
            ErrorKind::Export => "Export failed",
            ErrorKind::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ---------------------------------------------------------------------------
// parse_duration
// ---------------------------------------------------------------------------

/// Parse the duration text field into seconds.
///
/// ```
/// use audio_digitizer::pipeline::parse_duration;
///
/// assert_eq!(parse_duration(" 2.5 ").unwrap(), 2.5);
/// assert!(parse_duration("0").is_err());
/// assert!(parse_duration("five").is_err());
/// ```
pub fn parse_duration(text: &str) -> Result<f32, PipelineError> {
    let trimmed = text.trim();
    let secs: f32 = trimmed
        .parse()
        .map_err(|_| PipelineError::InvalidDuration(format!("`{trimmed}` is not a number")))?;
    validate_duration(secs)?;
    Ok(secs)
}

/// Reject zero, negative and non-finite durations.
pub(crate) fn validate_duration(secs: f32) -> Result<(), PipelineError> {
    if secs.is_finite() && secs > 0.0 {
        Ok(())
    } else {
        Err(PipelineError::InvalidDuration(format!(
            "duration must be greater than 0 seconds, got {secs}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_positive_numbers() {
        assert_eq!(parse_duration("5").unwrap(), 5.0);
        assert_eq!(parse_duration("0.25").unwrap(), 0.25);
    }

    #[test]
    fn parse_rejects_bad_input() {
        for bad in ["", "abc", "0", "-3", "NaN", "inf", "1e40"] {
            let err = parse_duration(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidDuration, "{bad}");
        }
    }

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(
            PipelineError::from(CaptureError::NoDevice).kind(),
            ErrorKind::Capture
        );
        assert_eq!(
            PipelineError::from(ConversionError::NothingCaptured).kind(),
            ErrorKind::Conversion
        );
        assert_eq!(
            PipelineError::from(ExportError::NothingConverted).kind(),
            ErrorKind::Export
        );
        assert_eq!(
            PipelineError::Internal("join".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn transparent_messages() {
        let err = PipelineError::from(ConversionError::InvalidSampleRate(0));
        assert_eq!(err.to_string(), ConversionError::InvalidSampleRate(0).to_string());
    }
}

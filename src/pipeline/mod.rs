//! Conversion pipeline: the capture → convert → export state machine and
//! the async orchestrator that feeds it from the UI.
//!
//! # Architecture
//!
//! ```text
//! DigitizerApp (egui) ──PipelineCommand (mpsc)──▶ PipelineOrchestrator::run()
//!        ▲                                               │  async tokio task
//!        │                                               ▼
//!        │                                 spawn_blocking(ConversionPipeline::…)
//!        │                                   ├─ capture  (CaptureDevice)
//!        │                                   ├─ convert  (resample → quantize)
//!        │                                   └─ export   (AudioExporter)
//!        └──────────────PipelineEvent (mpsc)────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use audio_digitizer::audio::{AudioBuffer, BitDepth};
//! use audio_digitizer::pipeline::{ConversionPipeline, ConversionRequest};
//!
//! let mut pipeline = ConversionPipeline::new();
//! pipeline.accept_capture(AudioBuffer::new(vec![0.0; 4_410], 44_100, BitDepth::TwentyFour).unwrap());
//!
//! let request = ConversionRequest::parse("8000", "8").unwrap();
//! let digitized = pipeline.convert(&request).unwrap();
//! assert_eq!(digitized.len(), 800);
//! ```

pub mod convert;
pub mod error;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use convert::{digitize, ConversionError, ConversionRequest, MAX_SAMPLE_RATE};
pub use error::{parse_duration, ErrorKind, PipelineError};
pub use runner::{
    OrchestratorSettings, PipelineCommand, PipelineEvent, PipelineOrchestrator, PipelineTask,
    SignalView,
};
pub use state::{ConversionPipeline, PipelineState};

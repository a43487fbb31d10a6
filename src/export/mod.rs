//! Writing digitized audio to disk.
//!
//! ```text
//! AudioBuffer ──▶ AudioExporter::export(path, format)
//!                   ├─ Wav ─▶ hound, integer PCM at the buffer's bit depth
//!                   └─ Mp3 ─▶ in-memory WAV ─▶ ffmpeg (libmp3lame) ─▶ path
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audio_digitizer::audio::{AudioBuffer, BitDepth};
//! use audio_digitizer::export::{AudioExporter, ExportFormat};
//!
//! let buf = AudioBuffer::new(vec![0.0; 8_000], 8_000, BitDepth::Eight).unwrap();
//! let exporter = AudioExporter::new("ffmpeg", 192);
//! let format = ExportFormat::from_path("out.mp3".as_ref()).unwrap();
//! exporter.export(&buf, "out.mp3".as_ref(), format).unwrap();
//! ```

pub mod exporter;
pub mod mp3;
pub mod wav;

pub use exporter::{AudioExporter, ExportError, ExportFormat};
pub use mp3::encode_mp3;
pub use wav::{encode_wav_bytes, wav_spec, write_wav_file};

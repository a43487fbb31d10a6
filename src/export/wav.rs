//! Mono integer-PCM WAV writing with `hound`.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::ExportError;
use crate::audio::{to_pcm_i32, AudioBuffer, BitDepth};

/// WAV header for `buffer`: one channel, integer PCM at the buffer's own
/// rate and bit depth.
pub fn wav_spec(buffer: &AudioBuffer) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: buffer.bit_depth().bits() as u16,
        sample_format: SampleFormat::Int,
    }
}

fn write_samples<W: Write + Seek>(
    writer: &mut WavWriter<W>,
    buffer: &AudioBuffer,
) -> Result<(), hound::Error> {
    let levels = to_pcm_i32(buffer);
    match buffer.bit_depth() {
        // Levels are within ±max_level, so the narrowing casts are lossless.
        BitDepth::Eight => {
            for level in levels {
                writer.write_sample(level as i8)?;
            }
        }
        BitDepth::Sixteen => {
            for level in levels {
                writer.write_sample(level as i16)?;
            }
        }
        BitDepth::TwentyFour => {
            for level in levels {
                writer.write_sample(level)?;
            }
        }
    }
    Ok(())
}

/// Write `buffer` to a WAV file at `path`, replacing any existing file.
pub fn write_wav_file(buffer: &AudioBuffer, path: &Path) -> Result<(), ExportError> {
    let mut writer = WavWriter::create(path, wav_spec(buffer))?;
    write_samples(&mut writer, buffer)?;
    writer.finalize()?;
    Ok(())
}

/// Serialise `buffer` to WAV bytes in memory.
pub fn encode_wav_bytes(buffer: &AudioBuffer) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), wav_spec(buffer))?;
        write_samples(&mut writer, buffer)?;
        writer.finalize()?;
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

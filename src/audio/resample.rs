//! Sample-rate conversion and channel mixing.
//!
//! 1. [`stereo_to_mono`] downmixes interleaved device frames to mono.
//! 2. [`resample`] converts an [`AudioBuffer`] to another sample rate with a
//!    band-limited windowed-sinc interpolator (`rubato::SincFixedIn`,
//!    Blackman-Harris window).
//!
//! When downsampling, rubato lowers the sinc cutoff in proportion to the
//! ratio, so content above the new Nyquist frequency is filtered out before
//! decimation instead of folding back as aliases.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::audio::AudioBuffer;
use crate::pipeline::ConversionError;

/// Frames fed to the resampler per `process` call.
const CHUNK_SIZE: usize = 1024;

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input slice is returned as an owned `Vec`.
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use audio_digitizer::audio::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Number of output samples for `input_len` samples converted from
/// `source_rate` to `target_rate`: `round(input_len * target / source)`,
/// never less than one.
pub fn output_len(input_len: usize, source_rate: u32, target_rate: u32) -> usize {
    let exact = input_len as f64 * f64::from(target_rate) / f64::from(source_rate);
    (exact.round() as usize).max(1)
}

fn sinc_parameters() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Leading input zeros and leading output frames to drop so that output
/// frame `j` lands on input position `j / ratio`.
///
/// `SincFixedIn` emits frame `j` at input position `(j + 1) / ratio - 1`.
/// Dropping `skip` frames and delaying the input by `pad` samples leaves a
/// residual offset of at most half an output frame.
fn alignment(ratio: f64) -> (usize, usize) {
    let skip = ratio.round().max(1.0) - 1.0;
    let pad = ((skip + 1.0) / ratio - 1.0).round().max(0.0);
    (pad as usize, skip as usize)
}

/// Resample `buffer` to `target_rate` Hz.
///
/// * Same rate: an identical copy is returned.
/// * Otherwise the output holds exactly
///   [`output_len`]`(buffer.len(), buffer.sample_rate(), target_rate)`
///   samples, and output sample `j` is the band-limited signal at input
///   time `j / target_rate` (to within half an output sample).
///
/// The bit depth tag is carried over unchanged; requantizing is a separate
/// step.
///
/// # Errors
///
/// [`ConversionError::InvalidSampleRate`] when `target_rate == 0`, or
/// [`ConversionError::Resampler`] if rubato rejects the configuration.
///
/// # Example
///
/// ```rust
/// use audio_digitizer::audio::{resample, AudioBuffer, BitDepth};
///
/// let hi = AudioBuffer::new(vec![0.25_f32; 4_800], 48_000, BitDepth::Sixteen).unwrap();
/// let lo = resample(&hi, 16_000).unwrap();
/// assert_eq!(lo.len(), 1_600);
/// assert_eq!(lo.sample_rate(), 16_000);
/// ```
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, ConversionError> {
    if target_rate == 0 {
        return Err(ConversionError::InvalidSampleRate(target_rate));
    }

    let source_rate = buffer.sample_rate();
    if source_rate == target_rate {
        return Ok(buffer.clone());
    }

    let expected = output_len(buffer.len(), source_rate, target_rate);
    let ratio = f64::from(target_rate) / f64::from(source_rate);
    let (pad, skip) = alignment(ratio);

    let input: Vec<f32> = std::iter::repeat(0.0)
        .take(pad)
        .chain(buffer.samples().iter().copied())
        .collect();

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_parameters(), CHUNK_SIZE, 1)
        .map_err(|e| ConversionError::Resampler(e.to_string()))?;

    let wanted = skip + expected;
    let mut output: Vec<f32> = Vec::with_capacity(wanted + CHUNK_SIZE);

    // Full chunks.
    let mut pos = 0;
    while input.len() - pos >= resampler.input_frames_next() {
        let n = resampler.input_frames_next();
        let block = resampler
            .process(&[&input[pos..pos + n]][..], None)
            .map_err(|e| ConversionError::Resampler(e.to_string()))?;
        output.extend_from_slice(&block[0]);
        pos += n;
    }

    // Remaining tail, zero-padded by rubato.
    if pos < input.len() {
        let block = resampler
            .process_partial(Some(&[&input[pos..]][..]), None)
            .map_err(|e| ConversionError::Resampler(e.to_string()))?;
        output.extend_from_slice(&block[0]);
    }

    // Flush the filter until the last input sample has come out.
    while output.len() < wanted {
        let block = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| ConversionError::Resampler(e.to_string()))?;
        if block[0].is_empty() {
            break;
        }
        output.extend_from_slice(&block[0]);
    }

    let mut samples: Vec<f32> = output.into_iter().skip(skip).take(expected).collect();
    samples.resize(expected, 0.0);

    log::debug!(
        "resample: {} samples @ {source_rate} Hz -> {} samples @ {target_rate} Hz",
        buffer.len(),
        samples.len()
    );

    AudioBuffer::new(samples, target_rate, buffer.bit_depth()).map_err(ConversionError::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_support::{rms_between, sine_buffer};
    use crate::audio::BitDepth;

    // ---- stereo_to_mono ----------------------------------------------------

    #[test]
    fn stereo_to_mono_already_mono() {
        let input = vec![0.1_f32, 0.2, 0.3];
        let out = stereo_to_mono(&input, 1);
        assert_eq!(out, input);
    }

    #[test]
    fn stereo_to_mono_two_channel() {
        let input = vec![1.0_f32, -1.0, 0.5, 0.5];
        let out = stereo_to_mono(&input, 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn stereo_to_mono_zero_channels() {
        let out = stereo_to_mono(&[1.0_f32, 2.0], 0);
        assert!(out.is_empty());
    }

    // ---- resample ----------------------------------------------------------

    #[test]
    fn zero_target_rate_rejected() {
        let buf = sine_buffer(440.0, 0.5, 8_000, 0.1);
        assert!(matches!(
            resample(&buf, 0),
            Err(ConversionError::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn same_rate_is_identity() {
        let buf = sine_buffer(440.0, 0.5, 44_100, 0.25);
        let out = resample(&buf, 44_100).unwrap();
        assert_eq!(out.len(), buf.len());
        for (a, b) in buf.samples().iter().zip(out.samples()) {
            assert!((a - b).abs() < 1e-6, "sample mismatch: {a} vs {b}");
        }
    }

    #[test]
    fn output_length_is_rounded_ratio() {
        let buf = sine_buffer(440.0, 0.5, 44_100, 1.0);
        let out = resample(&buf, 8_000).unwrap();
        assert_eq!(out.len(), 8_000);
        assert_eq!(out.sample_rate(), 8_000);

        // 1000 samples @ 44.1 kHz -> 22.05 kHz = 500 exactly
        let short = AudioBuffer::new(vec![0.0; 1_000], 44_100, BitDepth::Sixteen).unwrap();
        assert_eq!(resample(&short, 22_050).unwrap().len(), 500);

        // 1001 samples @ 3 -> 2 = 667.33 -> 667
        assert_eq!(output_len(1_001, 3, 2), 667);
    }

    #[test]
    fn single_sample_never_becomes_empty() {
        let buf = AudioBuffer::new(vec![0.5], 44_100, BitDepth::Sixteen).unwrap();
        let out = resample(&buf, 8_000).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn bit_depth_tag_is_preserved() {
        let buf = sine_buffer(440.0, 0.5, 44_100, 0.1);
        let out = resample(&buf, 22_050).unwrap();
        assert_eq!(out.bit_depth(), buf.bit_depth());
    }

    #[test]
    fn upsample_doubles_length() {
        let buf = sine_buffer(440.0, 0.5, 8_000, 0.5);
        let out = resample(&buf, 16_000).unwrap();
        assert_eq!(out.len(), 8_000);
    }

    #[test]
    fn in_band_tone_survives_downsampling() {
        let buf = sine_buffer(440.0, 0.5, 44_100, 1.0);
        let out = resample(&buf, 8_000).unwrap();

        let rms_in = rms_between(buf.samples(), 0.1, 0.9);
        let rms_out = rms_between(out.samples(), 0.1, 0.9);
        assert!(
            (rms_out - rms_in).abs() / rms_in < 0.05,
            "rms in {rms_in}, out {rms_out}"
        );
    }

    #[test]
    fn tone_above_target_nyquist_is_filtered() {
        // 6 kHz is above the 4 kHz Nyquist of an 8 kHz target.
        let buf = sine_buffer(6_000.0, 0.5, 44_100, 1.0);
        let out = resample(&buf, 8_000).unwrap();

        let rms_in = rms_between(buf.samples(), 0.1, 0.9);
        let rms_out = rms_between(out.samples(), 0.1, 0.9);
        assert!(
            rms_out < rms_in * 0.05,
            "aliased energy leaked through: in {rms_in}, out {rms_out}"
        );
    }

    #[test]
    fn down_then_up_is_lossy_but_keeps_in_band_energy() {
        // 440 Hz (kept) + 6 kHz (removed by the 8 kHz round trip)
        let low = sine_buffer(440.0, 0.4, 44_100, 1.0);
        let high = sine_buffer(6_000.0, 0.2, 44_100, 1.0);
        let mixed: Vec<f32> = low
            .samples()
            .iter()
            .zip(high.samples())
            .map(|(a, b)| a + b)
            .collect();
        let original = AudioBuffer::new(mixed, 44_100, BitDepth::TwentyFour).unwrap();

        let down = resample(&original, 8_000).unwrap();
        let back = resample(&down, 44_100).unwrap();
        assert_eq!(back.len(), original.len());

        // Not an exact reconstruction: the 6 kHz component is gone.
        let max_diff = original
            .samples()
            .iter()
            .zip(back.samples())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_diff > 0.1, "round trip unexpectedly exact: {max_diff}");

        // What remains matches the in-band 440 Hz component.
        let rms_low = rms_between(low.samples(), 0.1, 0.9);
        let rms_back = rms_between(back.samples(), 0.1, 0.9);
        assert!(
            (rms_back - rms_low).abs() / rms_low < 0.05,
            "in-band rms {rms_low}, round trip {rms_back}"
        );
    }

    // ---- time alignment ----------------------------------------------------

    fn impulse(len: usize, at: usize, rate: u32) -> AudioBuffer {
        let mut samples = vec![0.0_f32; len];
        samples[at] = 1.0;
        AudioBuffer::new(samples, rate, BitDepth::TwentyFour).unwrap()
    }

    fn loudest(samples: &[f32]) -> usize {
        samples
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap()
    }

    fn assert_impulse_lands(len: usize, at: usize, from: u32, to: u32) {
        let out = resample(&impulse(len, at, from), to).unwrap();
        let expected = (at as f64 * f64::from(to) / f64::from(from)).round() as usize;
        let peak = loudest(out.samples());
        assert!(
            peak.abs_diff(expected) <= 1,
            "{from} -> {to}: impulse at {at} peaked at {peak}, expected {expected}"
        );
        assert!(out.peak() > 0.1, "{from} -> {to}: impulse at {at} lost");
    }

    #[test]
    fn alignment_offsets() {
        assert_eq!(alignment(0.5), (1, 0));
        assert_eq!(alignment(2.0), (0, 1));
        assert_eq!(alignment(4.0), (0, 3));
    }

    #[test]
    fn impulse_position_preserved_when_downsampling() {
        assert_impulse_lands(44_100, 20_000, 44_100, 22_050);
        assert_impulse_lands(44_100, 22_050, 44_100, 8_000);
        assert_impulse_lands(48_000, 12_345, 48_000, 44_100);
    }

    #[test]
    fn impulse_position_preserved_when_upsampling() {
        assert_impulse_lands(8_000, 5_000, 8_000, 16_000);
        assert_impulse_lands(8_000, 3_000, 8_000, 44_100);
        assert_impulse_lands(44_100, 10_000, 44_100, 48_000);
    }

    #[test]
    fn leading_samples_are_kept() {
        assert_impulse_lands(4_410, 60, 44_100, 22_050);
        assert_impulse_lands(1_600, 10, 8_000, 16_000);
    }

    #[test]
    fn downsampled_sine_keeps_its_phase() {
        let buf = sine_buffer(440.0, 0.5, 44_100, 0.5);
        let out = resample(&buf, 22_050).unwrap();
        let ideal = sine_buffer(440.0, 0.5, 22_050, 0.5);
        assert_eq!(out.len(), ideal.len());

        let n = out.len();
        let max_diff = out.samples()[n / 10..n * 9 / 10]
            .iter()
            .zip(&ideal.samples()[n / 10..n * 9 / 10])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_diff < 0.02, "resampled sine drifted by {max_diff}");
    }
}

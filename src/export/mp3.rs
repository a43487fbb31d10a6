//! MP3 export through an external `ffmpeg` process.
//!
//! The buffer is serialised to WAV in memory and streamed to ffmpeg's stdin;
//! ffmpeg encodes with libmp3lame and writes the target file itself.

use std::ffi::OsString;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use super::wav::encode_wav_bytes;
use super::ExportError;
use crate::audio::AudioBuffer;

/// Arguments passed to ffmpeg for one encode. The output path is passed
/// through as an `OsStr`, so non-UTF-8 names survive.
fn ffmpeg_args(path: &Path, bitrate_kbps: u32) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "wav".into(),
        "-i".into(),
        "pipe:0".into(),
        "-codec:a".into(),
        "libmp3lame".into(),
        "-b:a".into(),
        format!("{bitrate_kbps}k").into(),
        "-y".into(),
        path.as_os_str().to_owned(),
    ]
}

/// Encode `buffer` to MP3 at `path`.
///
/// # Errors
///
/// * [`ExportError::EncoderUnavailable`] when `ffmpeg_path` cannot be
///   executed because it does not exist.
/// * [`ExportError::Encoder`] when ffmpeg exits unsuccessfully; its stderr
///   is included.
/// * [`ExportError::Io`] for other process or pipe failures.
pub fn encode_mp3(
    buffer: &AudioBuffer,
    path: &Path,
    ffmpeg_path: &Path,
    bitrate_kbps: u32,
) -> Result<(), ExportError> {
    let wav = encode_wav_bytes(buffer)?;

    let mut child = Command::new(ffmpeg_path)
        .args(ffmpeg_args(path, bitrate_kbps))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ExportError::EncoderUnavailable(ffmpeg_path.display().to_string()),
            _ => ExportError::Io(e),
        })?;

    // Feed stdin from a separate thread so a chatty stderr cannot deadlock
    // against a full stdin pipe.
    let feeder = child.stdin.take().map(|mut stdin| {
        std::thread::spawn(move || {
            // ffmpeg closing the pipe early surfaces as a non-zero exit below.
            let _ = stdin.write_all(&wav);
        })
    });

    let output = child.wait_with_output()?;
    if let Some(handle) = feeder {
        let _ = handle.join();
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        log::error!("export: ffmpeg failed ({}): {stderr}", output.status);
        return Err(ExportError::Encoder {
            status: output.status.to_string(),
            stderr,
        });
    }

    log::debug!("export: ffmpeg encoded {} at {bitrate_kbps} kbps", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_support::sine_buffer;
    use tempfile::tempdir;

    #[test]
    fn args_read_wav_from_stdin_and_set_bitrate() {
        let args = ffmpeg_args(Path::new("/tmp/out.mp3"), 128);
        let joined = args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        assert!(joined.contains("-f wav -i pipe:0"), "{joined}");
        assert!(joined.contains("-codec:a libmp3lame"), "{joined}");
        assert!(joined.contains("-b:a 128k"), "{joined}");
        assert_eq!(args.last(), Some(&OsString::from("/tmp/out.mp3")));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_output_path_passed_verbatim() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/tmp/caf\xe9.mp3"));
        let args = ffmpeg_args(path, 192);
        assert_eq!(args.last().map(|a| a.as_bytes()), Some(&b"/tmp/caf\xe9.mp3"[..]));
    }

    #[test]
    fn missing_binary_is_encoder_unavailable() {
        let dir = tempdir().expect("temp dir");
        let buf = sine_buffer(440.0, 0.5, 8_000, 0.05);
        let err = encode_mp3(
            &buf,
            &dir.path().join("x.mp3"),
            &dir.path().join("definitely-not-ffmpeg"),
            192,
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::EncoderUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn failing_encoder_reports_status() {
        // `false` exists on every unix and exits 1 regardless of arguments.
        let dir = tempdir().expect("temp dir");
        let buf = sine_buffer(440.0, 0.5, 8_000, 0.05);
        let err = encode_mp3(&buf, &dir.path().join("x.mp3"), Path::new("false"), 192)
            .unwrap_err();
        assert!(matches!(err, ExportError::Encoder { .. }), "{err}");
    }
}

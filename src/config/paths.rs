//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\audio-digitizer\
//!   macOS:   ~/Library/Application Support/audio-digitizer/
//!   Linux:   ~/.config/audio-digitizer/
//!
//! Cache dir (temporary capture file):
//!   Windows: %LOCALAPPDATA%\audio-digitizer\
//!   macOS:   ~/Library/Caches/audio-digitizer/
//!   Linux:   ~/.cache/audio-digitizer/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory holding the temporary capture file.
    pub cache_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "audio-digitizer";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
            cache_dir,
        }
    }

    /// Location of the temporary capture file named `file_name`.
    pub fn capture_file(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

//! Application entry point: audio digitizer.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Create pipeline channels (`command`, `event`).
//! 5. Spawn the pipeline orchestrator with the cpal capture device.
//! 6. Run [`eframe::run_native`], which blocks the main thread until the
//!    window is closed.
//! 7. Shut the runtime down (waiting for an in-flight capture), then remove
//!    the temporary capture file.

use std::sync::Arc;

use audio_digitizer::{
    app::DigitizerApp,
    audio::{CaptureFile, CpalCapture},
    config::{AppConfig, AppPaths},
    export::AudioExporter,
    pipeline::{OrchestratorSettings, PipelineCommand, PipelineEvent, PipelineOrchestrator},
};
use eframe::egui;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let vp = egui::ViewportBuilder::default()
        .with_title("Audio Digitizer")
        .with_inner_size([width, height])
        .with_min_inner_size([640.0, 360.0]);

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Audio digitizer starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (2 worker threads; heavy work goes to the blocking pool)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Channel setup
    let (command_tx, command_rx) = mpsc::channel::<PipelineCommand>(16);
    let (event_tx, event_rx) = mpsc::channel::<PipelineEvent>(32);

    // 5. Pipeline orchestrator
    let capture_file = CaptureFile::new(AppPaths::new().capture_file(&config.capture.temp_file_name));
    let orchestrator = PipelineOrchestrator::new(
        Arc::new(CpalCapture::new(config.capture.input_device.clone())),
        AudioExporter::from_config(&config.export),
        OrchestratorSettings::from(&config),
        event_tx,
    )
    .with_capture_file(capture_file.clone());
    rt.spawn(orchestrator.run(command_rx));

    // 6. UI (blocks until the window is closed)
    let app = DigitizerApp::new(command_tx, event_rx, config.clone());
    let result = eframe::run_native(
        "Audio Digitizer",
        native_options(&config),
        Box::new(move |_cc| Ok(Box::new(app))),
    );

    // 7. Cleanup
    shutdown(rt, &capture_file);

    result
}

/// Stop the runtime, then delete the capture file.
///
/// Dropping the runtime blocks until running `spawn_blocking` work returns,
/// so a capture still in progress has written its file before removal.
fn shutdown(rt: tokio::runtime::Runtime, capture_file: &CaptureFile) {
    drop(rt);
    if let Err(e) = capture_file.remove() {
        log::warn!("Could not remove {}: {e}", capture_file.path().display());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

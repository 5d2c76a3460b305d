//! Test Helper Utilities
//!
//! Shared utilities for testing moodset-acquire

#![allow(dead_code)]

pub mod audio_generator;
pub mod fake_backends;
pub mod log_capture;

pub use audio_generator::{generate_constant_wav, generate_test_wav, generate_waveform_dir, AudioConfig};
pub use fake_backends::{
    orchestrator, normalizer, CopyTranscoder, CountingConsole, DownloadBehavior, FailingTranscoder,
    FakeMedia, FakeSearch, FakeTrack,
};
pub use log_capture::LogCapture;

/// File names currently in a directory, sorted
pub fn dir_listing(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

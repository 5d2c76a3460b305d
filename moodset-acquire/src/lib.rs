//! moodset-acquire library interface
//!
//! Builds a mood-classification audio dataset: resolve tracks (link or
//! free-text query), download their audio, normalize to fixed-rate mono WAV,
//! and assemble a feature table from the resulting files.
//!
//! Exposed as a library for integration testing and reuse by the CLI.

pub mod backends;
pub mod config;
pub mod dataset;
pub mod error;
pub mod services;
pub mod types;
pub mod utils;
pub mod workflow;

pub use crate::config::{AcquireOptions, CliOverrides, PipelineSettings};
pub use crate::error::AcquireError;
pub use crate::workflow::{AcquisitionOrchestrator, BatchReport, TrackOutcome};

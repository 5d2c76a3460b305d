//! # moodset common library
//!
//! Shared code for the moodset crates:
//! - Error type used across configuration and logging
//! - TOML configuration model and loading
//! - Tracing subscriber initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};

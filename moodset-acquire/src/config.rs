//! Runtime settings for the acquisition pipeline
//!
//! Values are merged with the following priority:
//! 1. Command-line overrides
//! 2. Environment variables (`MOODSET_DOWNLOAD_PATH`, `MOODSET_YT_DLP`, `MOODSET_FFMPEG`)
//! 3. TOML config file
//! 4. Built-in defaults

use moodset_common::config::{
    env_path, NetworkConfig, TargetLength, TomlConfig, ToolsConfig, TranscoderKind,
    DEFAULT_DOWNLOAD_PATH, DEFAULT_MAX_SEARCHABLE_SECS, DEFAULT_SAMPLE_RATE,
    DEFAULT_TARGET_SECONDS, ENV_DOWNLOAD_PATH, ENV_FFMPEG, ENV_YT_DLP,
};
use moodset_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Per-call options for a single track acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireOptions {
    /// Directory for raw, intermediate and canonical files
    pub download_path: PathBuf,
    /// Canonical sample rate in Hz
    pub sample_rate: u32,
    /// Truncation policy (also drives the minimum-duration gate)
    pub target_length: TargetLength,
    /// Search hits longer than this are rejected by the resolver
    pub max_searchable_duration_secs: u64,
    /// Clear the console after each track
    pub clear_log: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from(DEFAULT_DOWNLOAD_PATH),
            sample_rate: DEFAULT_SAMPLE_RATE,
            target_length: TargetLength::Seconds(DEFAULT_TARGET_SECONDS),
            max_searchable_duration_secs: DEFAULT_MAX_SEARCHABLE_SECS,
            clear_log: true,
        }
    }
}

/// Values supplied on the command line; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub download_path: Option<PathBuf>,
    pub sample_rate: Option<u32>,
    pub target_length: Option<TargetLength>,
    pub max_search_duration: Option<u64>,
    pub concurrency: Option<usize>,
    pub no_clear_log: bool,
    pub transcoder: Option<TranscoderKind>,
}

/// Fully resolved pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub options: AcquireOptions,
    pub concurrency: usize,
    pub transcoder: TranscoderKind,
    pub preferred_container: Option<String>,
    pub network: NetworkConfig,
    pub tools: ToolsConfig,
}

impl PipelineSettings {
    /// Merge CLI overrides, environment and TOML values
    pub fn resolve(toml: &TomlConfig, cli: &CliOverrides) -> Result<Self> {
        let acquire = &toml.acquire;

        let download_path = cli
            .download_path
            .clone()
            .or_else(|| env_path(ENV_DOWNLOAD_PATH))
            .unwrap_or_else(|| acquire.download_path.clone());

        let sample_rate = cli.sample_rate.unwrap_or(acquire.sample_rate);
        if sample_rate == 0 {
            return Err(Error::InvalidInput("sample rate must be positive".to_string()));
        }

        let concurrency = cli.concurrency.unwrap_or(acquire.concurrency);
        if concurrency == 0 {
            return Err(Error::InvalidInput("concurrency must be at least 1".to_string()));
        }

        let mut tools = toml.tools.clone();
        if let Some(path) = env_path(ENV_YT_DLP) {
            tools.yt_dlp = path;
        }
        if let Some(path) = env_path(ENV_FFMPEG) {
            tools.ffmpeg = path;
        }

        let settings = Self {
            options: AcquireOptions {
                download_path,
                sample_rate,
                target_length: cli.target_length.unwrap_or(acquire.target_length),
                max_searchable_duration_secs: cli
                    .max_search_duration
                    .unwrap_or(acquire.max_searchable_duration_secs),
                clear_log: acquire.clear_log && !cli.no_clear_log,
            },
            concurrency,
            transcoder: cli.transcoder.unwrap_or(acquire.transcoder),
            preferred_container: acquire.preferred_container.clone(),
            network: toml.network.clone(),
            tools,
        };

        debug!(?settings, "Resolved pipeline settings");
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.network.download_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.network.tool_timeout_secs)
    }
}

//! Configuration model and loading
//!
//! Bootstrap configuration comes from a single TOML file. Every section and
//! field is optional; anything missing falls back to a built-in default.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `MOODSET_CONFIG` environment variable
//! 3. `<user config dir>/moodset/config.toml`
//!
//! A missing or unreadable config file never stops the program: a warning is
//! logged and defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "MOODSET_CONFIG";
/// Environment override for the download directory
pub const ENV_DOWNLOAD_PATH: &str = "MOODSET_DOWNLOAD_PATH";
/// Environment override for the yt-dlp executable
pub const ENV_YT_DLP: &str = "MOODSET_YT_DLP";
/// Environment override for the ffmpeg executable
pub const ENV_FFMPEG: &str = "MOODSET_FFMPEG";

/// Complete TOML configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Acquisition defaults
    pub acquire: AcquireConfig,
    /// Network budgets and retry policy
    pub network: NetworkConfig,
    /// External tool locations
    pub tools: ToolsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Acquisition defaults applied when the command line does not override them
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AcquireConfig {
    /// Directory receiving raw downloads and canonical waveforms
    pub download_path: PathBuf,
    /// Canonical sample rate in Hz
    pub sample_rate: u32,
    /// Truncation policy: "full" or a number of seconds
    pub target_length: TargetLength,
    /// Search hits longer than this are not trusted
    pub max_searchable_duration_secs: u64,
    /// Clear the terminal after each track
    pub clear_log: bool,
    /// Number of tracks processed at once (1 = sequential)
    pub concurrency: usize,
    /// Transcoder used to produce the intermediate waveform
    pub transcoder: TranscoderKind,
    /// Audio container preferred when several audio-only streams exist
    pub preferred_container: Option<String>,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from(DEFAULT_DOWNLOAD_PATH),
            sample_rate: DEFAULT_SAMPLE_RATE,
            target_length: TargetLength::Seconds(DEFAULT_TARGET_SECONDS),
            max_searchable_duration_secs: DEFAULT_MAX_SEARCHABLE_SECS,
            clear_log: true,
            concurrency: 1,
            transcoder: TranscoderKind::Ffmpeg,
            preferred_container: None,
        }
    }
}

/// Network budgets and retry policy
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request HTTP timeout for metadata-sized requests
    pub timeout_secs: u64,
    /// Total budget for a single audio download
    pub download_timeout_secs: u64,
    /// Budget for a single external tool invocation
    pub tool_timeout_secs: u64,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry
    pub initial_backoff_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            download_timeout_secs: 600,
            tool_timeout_secs: 120,
            max_retries: 2,
            initial_backoff_ms: 500,
        }
    }
}

/// External tool locations (bare names are looked up in PATH)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub yt_dlp: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: PathBuf::from("yt-dlp"),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

pub const DEFAULT_DOWNLOAD_PATH: &str = "./tmp";
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;
pub const DEFAULT_TARGET_SECONDS: u32 = 120;
pub const DEFAULT_MAX_SEARCHABLE_SECS: u64 = 600;

fn default_log_level() -> String {
    "info".to_string()
}

// ============================================================================
// Target length policy
// ============================================================================

/// How much of each source ends up in the canonical waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetLength {
    /// Keep the whole source
    Full,
    /// Keep at most this many seconds from the start
    Seconds(u32),
}

impl TargetLength {
    /// Maximum number of mono samples at `sample_rate`, `None` for `Full`
    pub fn max_samples(self, sample_rate: u32) -> Option<usize> {
        match self {
            Self::Full => None,
            Self::Seconds(secs) => Some(sample_rate as usize * secs as usize),
        }
    }

    /// Minimum source duration accepted by the validation gate
    pub fn required_secs(self) -> Option<u64> {
        match self {
            Self::Full => None,
            Self::Seconds(secs) => Some(u64::from(secs)),
        }
    }
}

impl fmt::Display for TargetLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Seconds(secs) => write!(f, "{}", secs),
        }
    }
}

impl FromStr for TargetLength {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("full") {
            return Ok(Self::Full);
        }
        trimmed
            .parse::<u32>()
            .map(Self::Seconds)
            .map_err(|_| {
                Error::InvalidInput(format!(
                    "target length must be \"full\" or a whole number of seconds, got '{}'",
                    s
                ))
            })
    }
}

impl Serialize for TargetLength {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Full => serializer.serialize_str("full"),
            Self::Seconds(secs) => serializer.serialize_u32(*secs),
        }
    }
}

impl<'de> Deserialize<'de> for TargetLength {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Self::Seconds(secs)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

// ============================================================================
// Transcoder selection
// ============================================================================

/// Which transcoder produces the intermediate waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscoderKind {
    /// External ffmpeg process (handles every container yt-dlp can return)
    Ffmpeg,
    /// In-process symphonia decode + rubato resample (no Opus support)
    Native,
}

impl fmt::Display for TranscoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ffmpeg => f.write_str("ffmpeg"),
            Self::Native => f.write_str("native"),
        }
    }
}

impl FromStr for TranscoderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(Self::Ffmpeg),
            "native" => Ok(Self::Native),
            other => Err(Error::InvalidInput(format!(
                "unknown transcoder '{}' (expected ffmpeg or native)",
                other
            ))),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Determine which config file to read, if any
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config directory
    dirs::config_dir().map(|d| d.join("moodset").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the config file if present, otherwise fall back to defaults
///
/// A file that exists but cannot be parsed is still an error. Runs before
/// the subscriber is installed, so it never logs; callers report the outcome.
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    match path {
        Some(path) if path.exists() => load_toml_config(path),
        _ => Ok(TomlConfig::default()),
    }
}

/// Read a non-empty environment variable as a path
pub fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

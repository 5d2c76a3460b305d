//! Core types and collaborator traits for the acquisition pipeline
//!
//! The pipeline talks to three external collaborators through traits:
//! - [`SearchBackend`]: free-text query → ranked hits with durations
//! - [`MediaBackend`]: link → metadata + audio-only stream, stream → bytes on disk
//! - [`Transcoder`]: raw media → intermediate PCM waveform at a target rate
//!
//! Everything else in this module is plain data passed between the
//! resolver, fetcher, normalizer and orchestrator.

use moodset_common::config::TargetLength;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Source identity
// ============================================================================

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Link usable with a [`MediaBackend`]
    pub link: String,
    /// Reported duration as given by the backend, `None` for live or unknown media
    pub duration_secs: Option<f64>,
    /// Display title, for logging only
    pub title: Option<String>,
}

/// Identifies a piece of media once its metadata has been probed
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSource {
    /// Link as given by the caller or the resolver
    pub link: String,
    /// Stable identifier, safe to use as a file stem
    pub identifier: String,
    /// Reported total duration in seconds, unrounded
    pub duration_secs: Option<f64>,
}

impl TrackSource {
    /// Build a source, sanitizing the backend identifier into a file stem
    ///
    /// Returns `None` when nothing usable is left after sanitizing.
    pub fn new(link: impl Into<String>, raw_identifier: &str, duration_secs: Option<f64>) -> Option<Self> {
        let identifier = sanitize_identifier(raw_identifier)?;
        Some(Self {
            link: link.into(),
            identifier,
            duration_secs,
        })
    }
}

/// Map an arbitrary identifier onto `[A-Za-z0-9_-]`
///
/// Other characters become `_`. Leading dots are impossible by construction,
/// so the result can never name a hidden file or a parent directory.
/// A trailing `_temp` (any case) gets one more `_` so `{id}.wav` never looks
/// like a transcoder intermediate.
pub fn sanitize_identifier(raw: &str) -> Option<String> {
    let mut cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return None;
    }
    if cleaned.to_ascii_lowercase().ends_with(TEMP_SUFFIX) {
        cleaned.push('_');
    }
    Some(cleaned)
}

const TEMP_SUFFIX: &str = "_temp";

/// Audio-only stream selected for download
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStream {
    /// Direct download URL
    pub url: String,
    /// Container extension without the dot (e.g. "webm", "m4a")
    pub container: String,
    /// Average bitrate in kbit/s, when reported
    pub bitrate_kbps: Option<f64>,
    /// Headers the host expects on the download request
    pub http_headers: HashMap<String, String>,
}

/// Result of the metadata probe performed before any download
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub source: TrackSource,
    pub stream: AudioStream,
}

/// Downloaded payload before normalization
///
/// Lives only for one orchestration run: the normalizer deletes it once the
/// canonical waveform is safely on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMedia {
    /// Final (fully written) download path
    pub path: PathBuf,
    /// Container extension of `path`
    pub container: String,
    /// Stable identifier, shared with the canonical output
    pub identifier: String,
    /// Link the media was fetched from
    pub link: String,
    /// Duration reported by the source metadata
    pub duration_secs: Option<f64>,
}

/// Normalized mono waveform; the only artifact that outlives a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalWaveform {
    pub path: PathBuf,
    pub identifier: String,
    pub sample_rate: u32,
    /// Always 1
    pub channels: u16,
    /// Number of mono samples written
    pub sample_count: usize,
    /// Truncation policy the file was produced under
    pub target_length: TargetLength,
}

impl CanonicalWaveform {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count as f64 / self.sample_rate as f64
    }
}

// ============================================================================
// File naming
// ============================================================================

/// Canonical output path: `{dir}/{id}.wav`
pub fn canonical_path(dir: &Path, identifier: &str) -> PathBuf {
    dir.join(format!("{}.wav", identifier))
}

/// Intermediate transcoded path: `{dir}/{id}_temp.wav`
pub fn temp_waveform_path(dir: &Path, identifier: &str) -> PathBuf {
    dir.join(format!("{}_temp.wav", identifier))
}

/// Raw download path: `{dir}/{id}.{container}`
pub fn raw_media_path(dir: &Path, identifier: &str, container: &str) -> PathBuf {
    dir.join(format!("{}.{}", identifier, container))
}

/// Staging path used while a file is still being written
pub fn staging_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

// ============================================================================
// Requests and per-track state
// ============================================================================

/// One unit of batch work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TrackRequest {
    /// Direct media link
    Link(String),
    /// Free-text search query
    Query(String),
}

impl TrackRequest {
    /// Parse one batch-file line
    ///
    /// Blank lines and `#` comments yield `None`. Lines starting with
    /// `http://` or `https://` are links; anything else is a query.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        if line.starts_with("http://") || line.starts_with("https://") {
            Some(Self::Link(line.to_string()))
        } else {
            Some(Self::Query(line.to_string()))
        }
    }

    /// Parse a whole batch file
    pub fn parse_batch(text: &str) -> Vec<Self> {
        text.lines().filter_map(Self::parse_line).collect()
    }
}

impl fmt::Display for TrackRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(link) => write!(f, "link {}", link),
            Self::Query(query) => write!(f, "query '{}'", query),
        }
    }
}

/// Per-track processing state
///
/// `Pending → Resolving (query only) → Fetching → Validating → Normalizing → Done`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    Pending,
    Resolving,
    Fetching,
    Validating,
    Normalizing,
    Done,
    Failed,
}

impl TrackState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Validating => "validating",
            Self::Normalizing => "normalizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Ranked search over an external catalogue
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Return at most `limit` hits, best match first
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Metadata lookup and stream download for media links
#[async_trait::async_trait]
pub trait MediaBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Probe a link: stable id, duration, best audio-only stream
    async fn lookup(&self, link: &str) -> Result<MediaInfo, FetchError>;

    /// Write the stream to `destination` and return the byte count
    ///
    /// Implementations must flush and sync before returning `Ok`.
    async fn download(&self, stream: &AudioStream, destination: &Path) -> Result<u64, FetchError>;
}

/// Raw media → intermediate PCM WAV at a target sample rate
///
/// Implementations keep the source channel count; mono collapse happens in
/// the normalizer.
#[async_trait::async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcoder name for logging
    fn name(&self) -> &'static str;

    async fn transcode(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<(), NormalizeError>;
}

// ============================================================================
// Component errors
// ============================================================================

/// Search backend errors
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search tool failed: {0}")]
    Tool(String),

    #[error("Search timed out after {0}s")]
    Timeout(u64),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No results")]
    NoResults,
}

/// Metadata probe and download errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {0}: {1}")]
    Http(u16, String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Media tool failed: {0}")]
    Tool(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No audio-only stream available")]
    NoAudioStream,

    #[error("Incomplete download: {0}")]
    IncompleteDownload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::IncompleteDownload(_) => true,
            Self::Http(status, _) => *status == 429 || *status >= 500,
            Self::Tool(_) | Self::Parse(_) | Self::NoAudioStream | Self::Io(_) => false,
        }
    }
}

/// Transcode and waveform I/O errors
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Transcoding failed: {0}")]
    Transcode(String),

    #[error("Decoding failed: {0}")]
    Decode(String),

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not ready: {0}")]
    NotReady(PathBuf),

    #[error("Worker task failed: {0}")]
    Task(String),
}

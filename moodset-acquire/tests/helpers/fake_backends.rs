//! In-memory collaborators for pipeline tests
//!
//! - [`FakeSearch`]: canned ranked hits per query
//! - [`FakeMedia`]: canned metadata per link; downloads write generated WAV data
//! - [`CopyTranscoder`] / [`FailingTranscoder`]: transcoder doubles
//! - [`CountingConsole`]: records clear() calls

use super::audio_generator::{generate_test_wav, AudioConfig};
use moodset_acquire::services::{AudioNormalizer, MediaFetcher, SourceResolver};
use moodset_acquire::types::{
    AudioStream, FetchError, MediaBackend, MediaInfo, NormalizeError, SearchBackend, SearchError,
    SearchHit, TrackSource, Transcoder,
};
use moodset_acquire::utils::{ConsoleOutput, ReadyPoll, RetryPolicy};
use moodset_acquire::AcquisitionOrchestrator;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Search
// ============================================================================

#[derive(Default)]
pub struct FakeSearch {
    results: HashMap<String, Vec<SearchHit>>,
    failing: Vec<String>,
    pub limits: Mutex<Vec<usize>>,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ranked hits for a query: (link, duration)
    pub fn with_hits(mut self, query: &str, hits: &[(&str, Option<f64>)]) -> Self {
        self.results.insert(
            query.to_string(),
            hits.iter()
                .map(|(link, duration)| SearchHit {
                    link: link.to_string(),
                    duration_secs: *duration,
                    title: None,
                })
                .collect(),
        );
        self
    }

    /// Make the backend fail for this query
    pub fn with_failure(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }
}

#[async_trait::async_trait]
impl SearchBackend for FakeSearch {
    fn name(&self) -> &'static str {
        "fake-search"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.limits.lock().unwrap().push(limit);

        if self.failing.iter().any(|q| q == query) {
            return Err(SearchError::Tool("search service unavailable".into()));
        }
        match self.results.get(query) {
            Some(hits) if !hits.is_empty() => Ok(hits.iter().take(limit).cloned().collect()),
            _ => Err(SearchError::NoResults),
        }
    }
}

// ============================================================================
// Media
// ============================================================================

/// How a fake download behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadBehavior {
    /// Write the generated audio
    Succeed,
    /// Write some bytes, then fail with HTTP 403 (permanent)
    FailPermanently,
    /// Fail with a network error this many times, then succeed
    FailTransiently(usize),
}

#[derive(Debug, Clone)]
pub struct FakeTrack {
    pub identifier: String,
    pub duration_secs: Option<f64>,
    pub container: String,
    pub audio: AudioConfig,
    pub behavior: DownloadBehavior,
}

impl FakeTrack {
    /// A healthy track whose reported duration matches its audio
    pub fn new(identifier: &str, audio: AudioConfig) -> Self {
        Self {
            identifier: identifier.to_string(),
            duration_secs: Some(audio.duration_seconds),
            container: "wave".to_string(),
            audio,
            behavior: DownloadBehavior::Succeed,
        }
    }

    pub fn reporting(mut self, duration_secs: Option<f64>) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    pub fn in_container(mut self, container: &str) -> Self {
        self.container = container.to_string();
        self
    }

    pub fn behaving(mut self, behavior: DownloadBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

#[derive(Default)]
pub struct FakeMedia {
    tracks: HashMap<String, FakeTrack>,
    attempts: Mutex<HashMap<String, usize>>,
    pub download_calls: AtomicUsize,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, link: &str, track: FakeTrack) -> Self {
        self.tracks.insert(link.to_string(), track);
        self
    }

    pub fn downloads(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn track_for_url(&self, url: &str) -> Option<&FakeTrack> {
        let id = url.strip_prefix("fake://")?;
        self.tracks.values().find(|t| t.identifier == id)
    }
}

#[async_trait::async_trait]
impl MediaBackend for FakeMedia {
    fn name(&self) -> &'static str {
        "fake-media"
    }

    async fn lookup(&self, link: &str) -> Result<MediaInfo, FetchError> {
        let track = self
            .tracks
            .get(link)
            .ok_or_else(|| FetchError::Tool(format!("unknown link {}", link)))?;

        let source = TrackSource::new(link, &track.identifier, track.duration_secs)
            .ok_or_else(|| FetchError::Parse("bad identifier".into()))?;

        Ok(MediaInfo {
            source,
            stream: AudioStream {
                url: format!("fake://{}", track.identifier),
                container: track.container.clone(),
                bitrate_kbps: Some(128.0),
                http_headers: HashMap::new(),
            },
        })
    }

    async fn download(&self, stream: &AudioStream, destination: &Path) -> Result<u64, FetchError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);

        let track = self
            .track_for_url(&stream.url)
            .ok_or_else(|| FetchError::Http(404, "Not Found".into()))?;

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(track.identifier.clone()).or_insert(0);
            *n += 1;
            *n
        };

        match track.behavior {
            DownloadBehavior::FailPermanently => {
                std::fs::write(destination, b"partial payload")?;
                return Err(FetchError::Http(403, "Forbidden".into()));
            }
            DownloadBehavior::FailTransiently(times) if attempt <= times => {
                return Err(FetchError::Network("connection reset".into()));
            }
            _ => {}
        }

        generate_test_wav(destination, &track.audio).map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(std::fs::metadata(destination)?.len())
    }
}

// ============================================================================
// Transcoders
// ============================================================================

/// Copies the input unchanged (input must already be a WAV at the target rate)
pub struct CopyTranscoder;

#[async_trait::async_trait]
impl Transcoder for CopyTranscoder {
    fn name(&self) -> &'static str {
        "copy"
    }

    async fn transcode(&self, input: &Path, output: &Path, _sample_rate: u32) -> Result<(), NormalizeError> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}

/// Leaves a partial temp file behind and fails
pub struct FailingTranscoder;

#[async_trait::async_trait]
impl Transcoder for FailingTranscoder {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn transcode(&self, _input: &Path, output: &Path, _sample_rate: u32) -> Result<(), NormalizeError> {
        tokio::fs::write(output, b"RIFF").await?;
        Err(NormalizeError::Transcode("codec not supported".into()))
    }
}

// ============================================================================
// Console
// ============================================================================

#[derive(Default)]
pub struct CountingConsole {
    pub clears: AtomicUsize,
}

impl ConsoleOutput for CountingConsole {
    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    }
}

pub fn fast_poll() -> ReadyPoll {
    ReadyPoll {
        interval: Duration::from_millis(5),
        max_attempts: 200,
    }
}

pub fn normalizer(transcoder: Arc<dyn Transcoder>) -> AudioNormalizer {
    AudioNormalizer::new(transcoder).with_ready_poll(fast_poll())
}

pub fn orchestrator(
    search: Arc<FakeSearch>,
    media: Arc<FakeMedia>,
    transcoder: Arc<dyn Transcoder>,
) -> AcquisitionOrchestrator {
    AcquisitionOrchestrator::new(
        SourceResolver::new(search),
        MediaFetcher::new(media, fast_retry()),
        normalizer(transcoder),
    )
}

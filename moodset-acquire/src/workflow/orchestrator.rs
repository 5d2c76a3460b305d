//! Acquisition orchestrator
//!
//! Composes resolver, fetcher and normalizer for single tracks and drives
//! batches. Per-track failures after resolution are contained: they are
//! logged, returned as [`TrackOutcome::Failed`] and never propagate.

use super::{failed_in, BatchReport, CompletedTrack, TrackFailure, TrackOutcome, TrackProgress};
use crate::backends::{FfmpegTranscoder, NativeTranscoder, YtDlpBackend};
use crate::config::{AcquireOptions, PipelineSettings};
use crate::error::AcquireError;
use crate::services::{AudioNormalizer, MediaFetcher, SourceResolver};
use crate::types::{CanonicalWaveform, FetchError, MediaBackend, SearchBackend, TrackRequest, TrackState, Transcoder};
use crate::utils::{ConsoleOutput, NoopConsole, RetryPolicy};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use moodset_common::config::{TargetLength, TranscoderKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

/// Per-identifier async locks, held only while some track uses them
#[derive(Default)]
struct IdentifierLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdentifierLocks {
    fn acquire(&self, identifier: &str) -> LockLease<'_> {
        let mut locks = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let lock = locks
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        LockLease {
            locks: self,
            identifier: identifier.to_string(),
            lock,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

/// Claim on one identifier's lock; the map entry goes away with the last lease
struct LockLease<'a> {
    locks: &'a IdentifierLocks,
    identifier: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl LockLease<'_> {
    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // The map and this lease are the only owners left
        let unused = locks
            .get(&self.identifier)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2);
        if unused {
            locks.remove(&self.identifier);
        }
    }
}

/// Drives single-track and batch acquisition
pub struct AcquisitionOrchestrator {
    resolver: SourceResolver,
    fetcher: MediaFetcher,
    normalizer: AudioNormalizer,
    console: Arc<dyn ConsoleOutput>,
    locks: IdentifierLocks,
}

impl AcquisitionOrchestrator {
    pub fn new(resolver: SourceResolver, fetcher: MediaFetcher, normalizer: AudioNormalizer) -> Self {
        Self {
            resolver,
            fetcher,
            normalizer,
            console: Arc::new(NoopConsole),
            locks: IdentifierLocks::default(),
        }
    }

    /// Wire the default backends from resolved settings
    pub fn from_settings(settings: &PipelineSettings) -> Result<Self, FetchError> {
        let backend = Arc::new(
            YtDlpBackend::new(
                settings.tools.yt_dlp.clone(),
                settings.request_timeout(),
                settings.download_timeout(),
                settings.tool_timeout(),
            )?
            .with_preferred_container(settings.preferred_container.clone()),
        );

        let transcoder: Arc<dyn Transcoder> = match settings.transcoder {
            TranscoderKind::Ffmpeg => Arc::new(FfmpegTranscoder::new(
                settings.tools.ffmpeg.clone(),
                settings.tool_timeout(),
            )),
            TranscoderKind::Native => Arc::new(NativeTranscoder::new()),
        };

        let search: Arc<dyn SearchBackend> = backend.clone();
        let media: Arc<dyn MediaBackend> = backend;

        Ok(Self::new(
            SourceResolver::new(search),
            MediaFetcher::new(media, RetryPolicy::new(&settings.network)),
            AudioNormalizer::new(transcoder),
        ))
    }

    /// Use this console for `clear_log`
    pub fn with_console(mut self, console: Arc<dyn ConsoleOutput>) -> Self {
        self.console = console;
        self
    }

    /// Operation A: acquire a track from a direct link
    ///
    /// Never fails: every error ends up in [`TrackOutcome::Failed`].
    pub async fn acquire_from_link(&self, url: &str, options: &AcquireOptions) -> TrackOutcome {
        self.finish_link(url, options, TrackProgress::new(url)).await
    }

    /// Operation B: resolve a query, then acquire like [`Self::acquire_from_link`]
    ///
    /// Resolution failure is returned as `Err`; later failures are contained.
    pub async fn acquire_from_query(
        &self,
        query: &str,
        options: &AcquireOptions,
    ) -> Result<TrackOutcome, AcquireError> {
        let mut progress = TrackProgress::new(query);
        progress.advance(TrackState::Resolving);

        if let Err(e) = tokio::fs::create_dir_all(&options.download_path).await {
            warn!(query, error = %e, "Cannot create download directory");
        }

        let Some(link) = self
            .resolver
            .resolve(query, options.max_searchable_duration_secs, true)
            .await
        else {
            progress.advance(TrackState::Failed);
            return Err(AcquireError::Resolution {
                query: query.to_string(),
            });
        };

        Ok(self.finish_link(&link, options, progress).await)
    }

    async fn finish_link(&self, url: &str, options: &AcquireOptions, mut progress: TrackProgress<'_>) -> TrackOutcome {
        let outcome = match self.run_link(url, options, &mut progress).await {
            Ok(waveform) => {
                progress.advance(TrackState::Done);
                TrackOutcome::Completed(waveform)
            }
            Err(e) => {
                warn!(
                    link = url,
                    state = %failed_in(&e),
                    kind = e.kind(),
                    error = %e,
                    "Track failed"
                );
                progress.advance(TrackState::Failed);
                TrackOutcome::Failed(e)
            }
        };

        if options.clear_log {
            self.console.clear();
        }
        outcome
    }

    /// Acquire many tracks with at most `concurrency` in flight
    ///
    /// The report lists tracks in request order. Resolution failures are
    /// recorded like any other failure.
    pub async fn acquire_batch(
        &self,
        requests: Vec<TrackRequest>,
        options: &AcquireOptions,
        concurrency: usize,
    ) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = requests.len();

        info!(%batch_id, total, concurrency, "Starting batch");

        let outcomes: Vec<(TrackRequest, Result<TrackOutcome, AcquireError>)> =
            stream::iter(requests.into_iter().enumerate())
                .map(|(index, request)| async move {
                    info!(%batch_id, track = index + 1, total, %request, "Processing track");
                    let outcome = match &request {
                        TrackRequest::Link(url) => Ok(self.acquire_from_link(url, options).await),
                        TrackRequest::Query(query) => self.acquire_from_query(query, options).await,
                    };
                    (request, outcome)
                })
                .buffered(concurrency.max(1))
                .collect()
                .await;

        let mut completed = Vec::new();
        let mut failures = Vec::new();
        for (request, outcome) in outcomes {
            match outcome {
                Ok(TrackOutcome::Completed(waveform)) => completed.push(CompletedTrack { request, waveform }),
                Ok(TrackOutcome::Failed(error)) | Err(error) => {
                    let state = failed_in(&error);
                    failures.push(TrackFailure { request, state, error });
                }
            }
        }

        let report = BatchReport {
            batch_id,
            started_at,
            finished_at: Utc::now(),
            completed,
            failures,
        };

        info!(
            %batch_id,
            completed = report.completed.len(),
            failed = report.failures.len(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Batch finished"
        );
        report
    }

    async fn run_link(
        &self,
        url: &str,
        options: &AcquireOptions,
        progress: &mut TrackProgress<'_>,
    ) -> Result<CanonicalWaveform, AcquireError> {
        let fetch_err = |cause: FetchError| AcquireError::Fetch {
            link: url.to_string(),
            cause,
        };

        progress.advance(TrackState::Fetching);
        tokio::fs::create_dir_all(&options.download_path)
            .await
            .map_err(|e| fetch_err(e.into()))?;

        let info = self.fetcher.probe(url).await.map_err(fetch_err)?;

        let lease = self.locks.acquire(&info.source.identifier);
        let _guard = lease.lock().await;

        progress.advance(TrackState::Validating);
        validate_duration(url, info.source.duration_secs, options.target_length)?;

        let raw = self
            .fetcher
            .download(&info, &options.download_path)
            .await
            .map_err(fetch_err)?;

        progress.advance(TrackState::Normalizing);
        self.normalizer
            .normalize(&raw, options.sample_rate, options.target_length)
            .await
            .map_err(|cause| AcquireError::Normalization {
                link: url.to_string(),
                cause,
            })
    }
}

/// Minimum-duration gate applied before any download
///
/// `Full` has no gate. With a target length, an unknown duration fails.
pub fn validate_duration(
    link: &str,
    reported_secs: Option<f64>,
    target_length: TargetLength,
) -> Result<(), AcquireError> {
    let Some(required_secs) = target_length.required_secs() else {
        return Ok(());
    };

    match reported_secs {
        Some(secs) if secs >= required_secs as f64 => Ok(()),
        _ => Err(AcquireError::Validation {
            link: link.to_string(),
            reported_secs,
            required_secs,
        }),
    }
}

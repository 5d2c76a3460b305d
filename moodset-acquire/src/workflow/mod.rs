//! Per-track workflow and batch reporting
//!
//! A track moves through [`TrackState`]s:
//! `Pending → Resolving (query only) → Fetching → Validating → Normalizing → Done`.
//! Any step can end in `Failed`; failures are contained per track and
//! collected into a [`BatchReport`].

pub mod orchestrator;

pub use orchestrator::AcquisitionOrchestrator;

use crate::error::AcquireError;
use crate::types::{CanonicalWaveform, TrackRequest, TrackState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

/// Result of one track acquisition
#[derive(Debug)]
pub enum TrackOutcome {
    Completed(CanonicalWaveform),
    Failed(AcquireError),
}

impl TrackOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn waveform(&self) -> Option<&CanonicalWaveform> {
        match self {
            Self::Completed(waveform) => Some(waveform),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AcquireError> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(e) => Some(e),
        }
    }
}

/// State a track was in when the given error stopped it
pub fn failed_in(error: &AcquireError) -> TrackState {
    match error {
        AcquireError::Resolution { .. } => TrackState::Resolving,
        AcquireError::Validation { .. } => TrackState::Validating,
        AcquireError::Fetch { .. } => TrackState::Fetching,
        AcquireError::Normalization { .. } => TrackState::Normalizing,
    }
}

/// Tracks and logs state transitions of one track
#[derive(Debug)]
pub(crate) struct TrackProgress<'a> {
    label: &'a str,
    state: TrackState,
}

impl<'a> TrackProgress<'a> {
    pub(crate) fn new(label: &'a str) -> Self {
        Self {
            label,
            state: TrackState::Pending,
        }
    }

    pub(crate) fn advance(&mut self, next: TrackState) {
        debug!(track = self.label, from = %self.state, to = %next, "Track state");
        self.state = next;
    }
}

/// A track that produced a canonical waveform
#[derive(Debug, Clone)]
pub struct CompletedTrack {
    pub request: TrackRequest,
    pub waveform: CanonicalWaveform,
}

/// A track that failed, with the state it failed in
#[derive(Debug)]
pub struct TrackFailure {
    pub request: TrackRequest,
    pub state: TrackState,
    pub error: AcquireError,
}

/// Outcome of a batch run, in request order
#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub completed: Vec<CompletedTrack>,
    pub failures: Vec<TrackFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failures.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Serializable view for writing to disk
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            batch_id: self.batch_id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            completed: self
                .completed
                .iter()
                .map(|c| CompletedSummary {
                    request: c.request.clone(),
                    path: c.waveform.path.clone(),
                    identifier: c.waveform.identifier.clone(),
                    sample_rate: c.waveform.sample_rate,
                    sample_count: c.waveform.sample_count,
                })
                .collect(),
            failures: self
                .failures
                .iter()
                .map(|f| FailureSummary {
                    request: f.request.clone(),
                    state: f.state,
                    kind: f.error.kind(),
                    message: f.error.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub completed: Vec<CompletedSummary>,
    pub failures: Vec<FailureSummary>,
}

#[derive(Debug, Serialize)]
pub struct CompletedSummary {
    pub request: TrackRequest,
    pub path: PathBuf,
    pub identifier: String,
    pub sample_rate: u32,
    pub sample_count: usize,
}

#[derive(Debug, Serialize)]
pub struct FailureSummary {
    pub request: TrackRequest,
    pub state: TrackState,
    pub kind: &'static str,
    pub message: String,
}

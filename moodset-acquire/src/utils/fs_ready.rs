//! File readiness and cleanup helpers
//!
//! A transcoded file is only read once it exists, is
//! non-empty, has a stable size across two polls and carries a parseable WAV
//! header. The poll is bounded; running out of attempts is an error.

use crate::types::NormalizeError;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Poll settings for [`wait_until_ready`]
#[derive(Debug, Clone, Copy)]
pub struct ReadyPoll {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReadyPoll {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            max_attempts: 100,
        }
    }
}

/// Wait until `path` holds a complete, readable WAV file
pub async fn wait_until_ready(path: &Path, poll: ReadyPoll) -> Result<(), NormalizeError> {
    let mut last_size: Option<u64> = None;

    for attempt in 0..poll.max_attempts {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => 0,
        };

        if size > 0 && last_size == Some(size) && hound::WavReader::open(path).is_ok() {
            debug!(path = %path.display(), size, attempts = attempt + 1, "File ready");
            return Ok(());
        }

        last_size = Some(size);
        tokio::time::sleep(poll.interval).await;
    }

    Err(NormalizeError::NotReady(path.to_path_buf()))
}

/// Remove a file, ignoring "not found" and logging anything else
pub fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}

/// Flush file contents to disk
pub fn sync_file(path: &Path) -> std::io::Result<()> {
    std::fs::File::open(path)?.sync_all()
}

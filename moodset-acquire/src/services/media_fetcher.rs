//! Link → raw media on local storage
//!
//! Downloads land in `{id}.{container}.part` and are renamed to
//! `{id}.{container}` only after the bytes are synced and the file is
//! non-empty, so a partial download is never visible under the final name.

use crate::types::{raw_media_path, staging_path, FetchError, MediaBackend, MediaInfo, RawMedia};
use crate::utils::{remove_quietly, RetryPolicy};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Probes and downloads media through a [`MediaBackend`]
pub struct MediaFetcher {
    backend: Arc<dyn MediaBackend>,
    retry: RetryPolicy,
}

impl MediaFetcher {
    pub fn new(backend: Arc<dyn MediaBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Resolve a link to a stable id, duration and audio-only stream
    pub async fn probe(&self, link: &str) -> Result<MediaInfo, FetchError> {
        let backend = &self.backend;
        let info = self.retry.run("probe", || backend.lookup(link)).await?;

        debug!(
            link,
            identifier = %info.source.identifier,
            duration_secs = ?info.source.duration_secs,
            container = %info.stream.container,
            bitrate_kbps = ?info.stream.bitrate_kbps,
            "Probed media"
        );
        Ok(info)
    }

    /// Download a probed stream into `destination_dir`
    pub async fn download(&self, info: &MediaInfo, destination_dir: &Path) -> Result<RawMedia, FetchError> {
        tokio::fs::create_dir_all(destination_dir).await?;

        let identifier = &info.source.identifier;
        let container = &info.stream.container;
        let final_path = raw_media_path(destination_dir, identifier, container);
        let part_path = staging_path(&final_path);

        let backend = &self.backend;
        let stream = &info.stream;
        let part = part_path.as_path();
        let result = self
            .retry
            .run("download", || async move {
                let bytes = backend.download(stream, part).await?;
                verify_download(part, bytes).await
            })
            .await;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_quietly(&part_path);
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&part_path, &final_path).await {
            remove_quietly(&part_path);
            return Err(e.into());
        }

        info!(
            link = %info.source.link,
            path = %final_path.display(),
            bytes,
            "Downloaded audio"
        );

        Ok(RawMedia {
            path: final_path,
            container: container.clone(),
            identifier: identifier.clone(),
            link: info.source.link.clone(),
            duration_secs: info.source.duration_secs,
        })
    }

    /// Probe + download in one step
    pub async fn fetch(&self, link: &str, destination_dir: &Path) -> Result<RawMedia, FetchError> {
        let info = self.probe(link).await?;
        self.download(&info, destination_dir).await
    }
}

/// Check a finished part file: it exists, is non-empty, matches the reported size
async fn verify_download(path: &Path, reported_bytes: u64) -> Result<u64, FetchError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| FetchError::IncompleteDownload(format!("{}: {}", path.display(), e)))?;

    if meta.len() == 0 {
        return Err(FetchError::IncompleteDownload(format!("{} is empty", path.display())));
    }
    if meta.len() != reported_bytes {
        return Err(FetchError::IncompleteDownload(format!(
            "{} has {} bytes, backend reported {}",
            path.display(),
            meta.len(),
            reported_bytes
        )));
    }
    Ok(meta.len())
}

//! Canonical waveform directory → feature table

use super::features::{FeatureExtractor, FeatureRecord, FeatureTable};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

/// Dataset assembly errors
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An extractor failed on a file; the whole build is aborted
    #[error("Extractor '{extractor}' failed on {}: {message}", .path.display())]
    Extractor {
        extractor: String,
        path: PathBuf,
        message: String,
    },
}

/// Maps every canonical waveform in a directory through the extractors
pub struct DatasetAssembler {
    extractors: Vec<Arc<dyn FeatureExtractor>>,
}

impl DatasetAssembler {
    pub fn new(extractors: Vec<Arc<dyn FeatureExtractor>>) -> Self {
        Self { extractors }
    }

    pub fn extractor_count(&self) -> usize {
        self.extractors.len()
    }

    /// List canonical waveform files directly inside `data_dir`, sorted by name
    ///
    /// `*_temp.wav` intermediates and `*.part` staging files are skipped.
    pub fn list_waveforms(&self, data_dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
        if !data_dir.exists() {
            return Err(DatasetError::NotFound(data_dir.to_path_buf()));
        }
        if !data_dir.is_dir() {
            return Err(DatasetError::NotADirectory(data_dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(data_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                DatasetError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk error")),
                )
            })?;
            if entry.file_type().is_file() && is_canonical_waveform(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        tracing::debug!(dir = %data_dir.display(), files = files.len(), "Listed waveforms");
        Ok(files)
    }

    /// Build one record per waveform file
    ///
    /// Files are processed in parallel; rows come back sorted by file name.
    pub fn build(&self, data_dir: &Path) -> Result<FeatureTable, DatasetError> {
        let files = self.list_waveforms(data_dir)?;

        let rows = files
            .par_iter()
            .map(|path| self.extract_record(path))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            dir = %data_dir.display(),
            rows = rows.len(),
            extractors = self.extractors.len(),
            "Assembled feature table"
        );
        Ok(FeatureTable { rows })
    }

    fn extract_record(&self, path: &Path) -> Result<FeatureRecord, DatasetError> {
        let mut features = BTreeMap::new();
        for extractor in &self.extractors {
            let value = extractor.extract(path).map_err(|e| DatasetError::Extractor {
                extractor: extractor.name().to_string(),
                path: path.to_path_buf(),
                message: format!("{:#}", e),
            })?;
            features.insert(extractor.name().to_string(), value);
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(FeatureRecord::new(file_name, path.to_path_buf(), features))
    }
}

fn is_canonical_waveform(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".wav") && !lower.ends_with("_temp.wav")
}

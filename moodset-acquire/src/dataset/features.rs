//! Feature values, records and the extractor contract

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One extracted feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

/// Maps a canonical waveform file to one feature value
///
/// Implementations must be pure: the assembler calls each extractor once
/// per file, from several threads at once.
pub trait FeatureExtractor: Send + Sync {
    /// Column name in the feature table
    fn name(&self) -> &str;

    fn extract(&self, path: &Path) -> anyhow::Result<FeatureValue>;
}

/// Features of one waveform file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    file_name: String,
    path: PathBuf,
    features: BTreeMap<String, FeatureValue>,
}

impl FeatureRecord {
    pub fn new(file_name: String, path: PathBuf, features: BTreeMap<String, FeatureValue>) -> Self {
        Self {
            file_name,
            path,
            features,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn features(&self) -> &BTreeMap<String, FeatureValue> {
        &self.features
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.features.get(name)
    }
}

/// Rows sorted by file name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRecord>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the table as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

// ============================================================================
// Reference extractors
// ============================================================================

/// Field read from the WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    DurationSecs,
    SampleRate,
    SampleCount,
}

/// Extractor reading a single WAV header field
#[derive(Debug, Clone, Copy)]
pub struct HeaderExtractor {
    field: HeaderField,
}

impl HeaderExtractor {
    pub fn new(field: HeaderField) -> Self {
        Self { field }
    }

    /// Duration, sample rate and sample count extractors
    pub fn all() -> Vec<Arc<dyn FeatureExtractor>> {
        vec![
            Arc::new(Self::new(HeaderField::DurationSecs)),
            Arc::new(Self::new(HeaderField::SampleRate)),
            Arc::new(Self::new(HeaderField::SampleCount)),
        ]
    }
}

impl FeatureExtractor for HeaderExtractor {
    fn name(&self) -> &str {
        match self.field {
            HeaderField::DurationSecs => "duration_secs",
            HeaderField::SampleRate => "sample_rate",
            HeaderField::SampleCount => "sample_count",
        }
    }

    fn extract(&self, path: &Path) -> anyhow::Result<FeatureValue> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        // duration() is in frames, i.e. per-channel samples
        let frames = reader.duration();

        let value = match self.field {
            HeaderField::DurationSecs => {
                if spec.sample_rate == 0 {
                    anyhow::bail!("sample rate is zero in {}", path.display());
                }
                f64::from(frames) / f64::from(spec.sample_rate)
            }
            HeaderField::SampleRate => f64::from(spec.sample_rate),
            HeaderField::SampleCount => f64::from(frames),
        };
        Ok(FeatureValue::Scalar(value))
    }
}

//! Track-level error taxonomy
//!
//! Component errors ([`FetchError`], [`NormalizeError`]) are wrapped here
//! together with the link or query they came from.

use crate::types::{FetchError, NormalizeError};
use thiserror::Error;

/// Failure of one track acquisition
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Query produced no trustworthy link
    #[error("No trustworthy source found for query '{query}'")]
    Resolution { query: String },

    /// Source is shorter than the configured target length (or reports no duration)
    #[error("Source {link} too short: reported {}, required {required_secs}s", fmt_secs(.reported_secs))]
    Validation {
        link: String,
        reported_secs: Option<f64>,
        required_secs: u64,
    },

    /// Metadata probe or download failed
    #[error("Download failed for {link}: {cause}")]
    Fetch {
        link: String,
        #[source]
        cause: FetchError,
    },

    /// Transcode, load or persist of the waveform failed
    #[error("Normalization failed for {link}: {cause}")]
    Normalization {
        link: String,
        #[source]
        cause: NormalizeError,
    },
}

impl AcquireError {
    /// Stable short label for reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution { .. } => "resolution",
            Self::Validation { .. } => "validation",
            Self::Fetch { .. } => "download",
            Self::Normalization { .. } => "normalization",
        }
    }

    /// Link or query the failure belongs to
    pub fn origin(&self) -> &str {
        match self {
            Self::Resolution { query } => query,
            Self::Validation { link, .. }
            | Self::Fetch { link, .. }
            | Self::Normalization { link, .. } => link,
        }
    }
}

fn fmt_secs(secs: &Option<f64>) -> String {
    match secs {
        Some(secs) => format!("{}s", secs),
        None => "unknown duration".to_string(),
    }
}

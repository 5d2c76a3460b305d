//! Query → single trustworthy link
//!
//! A hit is trusted only when its reported duration is within the cutoff.
//! Only the top two hits are ever looked at.

use crate::types::{SearchBackend, SearchHit};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of ranked hits the trust policy considers
pub const CANDIDATE_COUNT: usize = 2;

/// Resolves free-text queries through a [`SearchBackend`]
pub struct SourceResolver {
    backend: Arc<dyn SearchBackend>,
}

impl SourceResolver {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    /// Resolve a query to a link, or `None` when no hit can be trusted
    ///
    /// Never fails: search errors are logged and reported as `None`. The log
    /// line is a warning only when `warn_on_failure` is set.
    pub async fn resolve(
        &self,
        query: &str,
        max_acceptable_duration_secs: u64,
        warn_on_failure: bool,
    ) -> Option<String> {
        let hits = match self.backend.search(query, CANDIDATE_COUNT).await {
            Ok(hits) => hits,
            Err(e) => {
                if warn_on_failure {
                    warn!(query, backend = self.backend.name(), error = %e, "Search failed");
                } else {
                    debug!(query, backend = self.backend.name(), error = %e, "Search failed");
                }
                return None;
            }
        };

        match select_trusted(&hits, max_acceptable_duration_secs) {
            Some(hit) => {
                info!(
                    query,
                    link = %hit.link,
                    duration_secs = ?hit.duration_secs,
                    "Resolved query"
                );
                Some(hit.link.clone())
            }
            None => {
                if warn_on_failure {
                    warn!(
                        query,
                        cutoff_secs = max_acceptable_duration_secs,
                        "No search result within duration cutoff"
                    );
                } else {
                    debug!(
                        query,
                        cutoff_secs = max_acceptable_duration_secs,
                        "No search result within duration cutoff"
                    );
                }
                None
            }
        }
    }
}

/// Apply the trust policy to ranked hits
///
/// First hit if within the cutoff, else the second if within the cutoff,
/// else none. The reported duration is compared as is; unknown durations
/// never qualify.
pub fn select_trusted(hits: &[SearchHit], cutoff_secs: u64) -> Option<&SearchHit> {
    hits.iter()
        .take(CANDIDATE_COUNT)
        .find(|hit| matches!(hit.duration_secs, Some(d) if d <= cutoff_secs as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(link: &str, duration: Option<f64>) -> SearchHit {
        SearchHit {
            link: link.to_string(),
            duration_secs: duration,
            title: None,
        }
    }

    #[test]
    fn test_top_result_within_cutoff() {
        let hits = vec![hit("r0", Some(300.0)), hit("r1", Some(200.0))];
        assert_eq!(select_trusted(&hits, 600).unwrap().link, "r0");
    }

    #[test]
    fn test_falls_back_to_second() {
        let hits = vec![hit("r0", Some(700.0)), hit("r1", Some(500.0))];
        assert_eq!(select_trusted(&hits, 600).unwrap().link, "r1");
    }

    #[test]
    fn test_both_too_long() {
        let hits = vec![hit("r0", Some(700.0)), hit("r1", Some(650.0))];
        assert!(select_trusted(&hits, 600).is_none());
    }

    #[test]
    fn test_third_never_considered() {
        let hits = vec![hit("r0", Some(700.0)), hit("r1", Some(650.0)), hit("r2", Some(100.0))];
        assert!(select_trusted(&hits, 600).is_none());
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let hits = vec![hit("r0", Some(600.0))];
        assert_eq!(select_trusted(&hits, 600).unwrap().link, "r0");
    }

    #[test]
    fn test_fractional_duration_over_cutoff() {
        let hits = vec![hit("r0", Some(600.4)), hit("r1", Some(599.9))];
        assert_eq!(select_trusted(&hits, 600).unwrap().link, "r1");

        let hits = vec![hit("r0", Some(600.4)), hit("r1", Some(600.01))];
        assert!(select_trusted(&hits, 600).is_none());
    }

    #[test]
    fn test_unknown_duration_is_untrusted() {
        let hits = vec![hit("live", None), hit("r1", Some(100.0))];
        assert_eq!(select_trusted(&hits, 600).unwrap().link, "r1");
    }

    #[test]
    fn test_empty() {
        assert!(select_trusted(&[], 600).is_none());
    }
}

//! Per-candidate outcomes of a batch acquisition.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// How one candidate fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Metadata stored (arXiv references) and, when requested, introduction found.
    Succeeded,
    /// The reference could not be resolved or its metadata could not be fetched.
    RetrievalFailed(String),
    /// Retrieval worked but no introduction could be extracted.
    ExtractionFailed,
}

impl CandidateStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("ok"),
            Self::RetrievalFailed(reason) => write!(f, "retrieval failed: {reason}"),
            Self::ExtractionFailed => f.write_str("no introduction found"),
        }
    }
}

/// Result for one input reference.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    /// The reference as given.
    pub reference: String,
    /// Canonical identifier, when the reference could be classified.
    pub identifier: Option<String>,
    #[serde(flatten)]
    pub status: CandidateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
}

impl CandidateReport {
    pub(crate) fn retrieval_failed(
        reference: String,
        identifier: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            reference,
            identifier,
            status: CandidateStatus::RetrievalFailed(reason.into()),
            introduction: None,
        }
    }
}

/// Outcome of [`Acquirer::acquire_batch`](crate::Acquirer::acquire_batch), in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub candidates: Vec<CandidateReport>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, CandidateStatus::Succeeded))
    }

    pub fn retrieval_failed(&self) -> usize {
        self.count(|s| matches!(s, CandidateStatus::RetrievalFailed(_)))
    }

    pub fn extraction_failed(&self) -> usize {
        self.count(|s| matches!(s, CandidateStatus::ExtractionFailed))
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    fn count(&self, pred: impl Fn(&CandidateStatus) -> bool) -> usize {
        self.candidates.iter().filter(|c| pred(&c.status)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: CandidateStatus) -> CandidateReport {
        CandidateReport {
            reference: "2409.16928".into(),
            identifier: Some("2409.16928".into()),
            status,
            introduction: None,
        }
    }

    #[test]
    fn counts_by_status() {
        let batch = BatchReport {
            candidates: vec![
                report(CandidateStatus::Succeeded),
                report(CandidateStatus::RetrievalFailed("HTTP 503".into())),
                report(CandidateStatus::ExtractionFailed),
                report(CandidateStatus::Succeeded),
            ],
            elapsed: Duration::from_millis(5),
        };
        assert_eq!(batch.succeeded(), 2);
        assert_eq!(batch.retrieval_failed(), 1);
        assert_eq!(batch.extraction_failed(), 1);
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn status_serializes_with_reason() {
        let json =
            serde_json::to_string(&report(CandidateStatus::RetrievalFailed("timeout".into())))
                .unwrap();
        assert!(json.contains(r#""status":"retrieval_failed""#));
        assert!(json.contains(r#""reason":"timeout""#));
        assert!(!json.contains("introduction"));
    }
}

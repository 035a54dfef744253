//! Citation client for the Semantic Scholar Graph API.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use papertrail_fetch::Fetcher;
use papertrail_shared::{CitationConfig, PaperTrailError, ReferenceRecord, Result};

static ARXIV_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{4}\.\d{4,5}|[a-z][a-z\-]*(?:\.[A-Z]{2})?/\d{7})(?:v\d+)?$")
        .expect("valid regex")
});

#[derive(Debug, Deserialize)]
struct ReferencesResponse {
    #[serde(default)]
    data: Option<Vec<ReferenceEntry>>,
}

#[derive(Debug, Deserialize)]
struct ReferenceEntry {
    #[serde(rename = "citedPaper", default)]
    cited_paper: Option<CitedPaper>,
}

#[derive(Debug, Deserialize)]
struct CitedPaper {
    #[serde(rename = "paperId", default)]
    paper_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "externalIds", default)]
    external_ids: Option<ExternalIds>,
    #[serde(default)]
    arxiv_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "ArXiv", default)]
    arxiv: Option<String>,
}

impl CitedPaper {
    fn into_record(self) -> ReferenceRecord {
        let arxiv_id = self
            .external_ids
            .and_then(|ids| ids.arxiv)
            .or(self.arxiv_id)
            .filter(|id| !id.is_empty());
        let identifier = arxiv_id.clone().or(self.paper_id);
        ReferenceRecord {
            identifier,
            title: self.title,
            arxiv_id,
        }
    }
}

/// Query client for a paper's reference list.
#[derive(Debug, Clone)]
pub struct CitationClient {
    fetcher: Fetcher,
    config: CitationConfig,
}

impl CitationClient {
    pub fn new(fetcher: Fetcher, config: CitationConfig) -> Self {
        Self { fetcher, config }
    }

    /// References of `identifier`, in the order the API lists them.
    ///
    /// A paper with no recorded references yields an empty list.
    #[instrument(skip(self))]
    pub async fn get_references(&self, identifier: &str) -> Result<Vec<ReferenceRecord>> {
        let url = self.references_url(identifier)?;

        let mut headers = Vec::new();
        if let Some(key) = self.config.api_key() {
            headers.push(("x-api-key", key));
        }

        let doc = self.fetcher.fetch_with_headers(&url, &headers).await?;
        let response: ReferencesResponse = serde_json::from_slice(&doc.body).map_err(|e| {
            PaperTrailError::Retrieval(format!("malformed references response: {e}"))
        })?;

        let records: Vec<ReferenceRecord> = response
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| entry.cited_paper)
            .map(CitedPaper::into_record)
            .collect();

        debug!(count = records.len(), "references returned");
        Ok(records)
    }

    fn references_url(&self, identifier: &str) -> Result<Url> {
        let id = identifier.trim();
        if id.is_empty() {
            return Err(PaperTrailError::validation("empty paper identifier"));
        }

        let bare = id.trim_start_matches("arXiv:").trim_start_matches("arxiv:");
        let key = if ARXIV_ID_RE.is_match(bare) {
            format!("arXiv:{bare}")
        } else {
            id.to_string()
        };

        let base = self.config.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/paper/{key}/references")).map_err(|e| {
            PaperTrailError::config(format!("invalid citations base_url {base:?}: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("fields", "title,externalIds")
            .append_pair("limit", &self.config.limit.to_string());
        Ok(url)
    }
}

//! Acquisition pipeline: search → store, and reference batches → metadata + introductions.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info, instrument, warn};

use papertrail_extract::{PaperReference, SourceResolver};
use papertrail_fetch::Fetcher;
use papertrail_shared::{
    AcquireConfig, AppConfig, CitationConfig, FetchConfig, ResolverConfig, Result, SearchConfig,
    SearchResult,
};
use papertrail_sources::{CitationClient, SearchClient};
use papertrail_store::{IngestSummary, PaperProfileStore, ProfileUpdate, RawPaperRecord};

use crate::report::{BatchReport, CandidateReport, CandidateStatus};

/// Store handle shared between acquisition tasks. Readers run concurrently,
/// mutations take the write lock.
pub type SharedStore = Arc<RwLock<PaperProfileStore>>;

/// Wrap a store for concurrent use.
pub fn shared(store: PaperProfileStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}

/// Progress callback for batch acquisition.
pub trait BatchProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per candidate, in input order.
    fn candidate_finished(&self, reference: &str, status: &CandidateStatus, current: usize, total: usize);
    /// Called when the batch completes.
    fn done(&self, report: &BatchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn candidate_finished(&self, _reference: &str, _status: &CandidateStatus, _current: usize, _total: usize) {}
    fn done(&self, _report: &BatchReport) {}
}

/// Ties the search, citation and extraction clients to a profile store.
#[derive(Debug, Clone)]
pub struct Acquirer {
    config: AcquireConfig,
    search: SearchClient,
    citations: CitationClient,
    resolver: Arc<SourceResolver>,
}

impl Acquirer {
    pub fn new(
        config: AcquireConfig,
        search: SearchClient,
        citations: CitationClient,
        resolver: SourceResolver,
    ) -> Self {
        Self {
            config,
            search,
            citations,
            resolver: Arc::new(resolver),
        }
    }

    /// Wire every client from the application config. All clients share one
    /// fetcher, and with it one per-host rate limiter.
    pub fn from_config(app: &AppConfig) -> Result<Self> {
        let fetcher = Fetcher::new(FetchConfig::from(app))?;
        Ok(Self::new(
            AcquireConfig::from(app),
            SearchClient::new(fetcher.clone(), SearchConfig::from(app)),
            CitationClient::new(fetcher.clone(), CitationConfig::from(app)),
            SourceResolver::new(fetcher, &ResolverConfig::from(app)),
        ))
    }

    pub fn config(&self) -> &AcquireConfig {
        &self.config
    }

    pub fn search(&self) -> &SearchClient {
        &self.search
    }

    pub fn citations(&self) -> &CitationClient {
        &self.citations
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    /// Search `domain` and fold the results into the store, one profile per paper.
    #[instrument(skip(self, store))]
    pub async fn pull_papers(&self, num: usize, domain: &str, store: &SharedStore) -> Result<IngestSummary> {
        let results = self.search.search_related(num, domain, domain).await?;
        let groups = group_by_published_date(&results);
        let summary = store.write().await.ingest(groups);
        info!(results = results.len(), added = summary.added, merged = summary.merged, "pull complete");
        Ok(summary)
    }

    /// Acquire metadata (and optionally introductions) for many references.
    ///
    /// At most `concurrency` candidates are in flight. One candidate's failure
    /// never aborts the others; the report lists every input, in input order.
    #[instrument(skip_all, fields(count = references.len()))]
    pub async fn acquire_batch(
        &self,
        references: &[String],
        store: &SharedStore,
        progress: &dyn BatchProgress,
    ) -> BatchReport {
        let start = Instant::now();
        let total = references.len();
        progress.phase("Acquiring papers");

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1) as usize));
        let mut handles = Vec::with_capacity(total);

        for reference in references {
            let reference = reference.clone();
            let sem = semaphore.clone();
            let search = self.search.clone();
            let resolver = self.resolver.clone();
            let store = store.clone();
            let extract = self.config.extract_introductions;

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return CandidateReport::retrieval_failed(reference, None, "acquisition cancelled");
                };
                acquire_one(reference, &search, &resolver, &store, extract).await
            }));
        }

        let mut candidates = Vec::with_capacity(total);
        for (i, (handle, reference)) in handles.into_iter().zip(references).enumerate() {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    warn!(reference = %reference, error = %e, "acquisition task failed");
                    CandidateReport::retrieval_failed(reference.clone(), None, format!("task failed: {e}"))
                }
            };
            progress.candidate_finished(&report.reference, &report.status, i + 1, total);
            candidates.push(report);
        }

        let report = BatchReport {
            candidates,
            elapsed: start.elapsed(),
        };
        info!(
            succeeded = report.succeeded(),
            retrieval_failed = report.retrieval_failed(),
            extraction_failed = report.extraction_failed(),
            elapsed_ms = report.elapsed.as_millis(),
            "batch complete"
        );
        progress.done(&report);
        report
    }

    /// Acquire every arXiv paper cited by `identifier`.
    #[instrument(skip(self, store, progress))]
    pub async fn acquire_references(
        &self,
        identifier: &str,
        store: &SharedStore,
        progress: &dyn BatchProgress,
    ) -> Result<BatchReport> {
        progress.phase("Fetching references");
        let references = self.citations.get_references(identifier).await?;

        let cited: Vec<String> = references
            .into_iter()
            .filter_map(|r| r.arxiv_id)
            .collect();
        debug!(cited = cited.len(), "references with arXiv identifiers");

        Ok(self.acquire_batch(&cited, store, progress).await)
    }
}

async fn acquire_one(
    reference: String,
    search: &SearchClient,
    resolver: &SourceResolver,
    store: &SharedStore,
    extract: bool,
) -> CandidateReport {
    let parsed = match PaperReference::parse(&reference) {
        Ok(parsed) => parsed,
        Err(e) => return CandidateReport::retrieval_failed(reference, None, e.to_string()),
    };
    let identifier = parsed.canonical_id();

    // Only arXiv references have a metadata source.
    if let Some(id) = parsed.arxiv_id() {
        match search.fetch_by_identifier(id).await {
            Ok(result) => merge_profile(store, result).await,
            Err(e) => {
                debug!(reference = %reference, error = %e, "metadata retrieval failed");
                return CandidateReport::retrieval_failed(reference, Some(identifier), e.to_string());
            }
        }
    }

    let mut introduction = None;
    let status = if extract {
        let outcome = resolver.introduction_for(parsed).await;
        match outcome.text {
            Some(text) => {
                introduction = Some(text);
                CandidateStatus::Succeeded
            }
            None => CandidateStatus::ExtractionFailed,
        }
    } else {
        CandidateStatus::Succeeded
    };

    CandidateReport {
        reference,
        identifier: Some(identifier),
        status,
        introduction,
    }
}

/// Fold fetched metadata into the store without discarding fields the
/// source left empty.
async fn merge_profile(store: &SharedStore, result: SearchResult) {
    let profile = result.to_profile();
    let update = ProfileUpdate {
        title: profile.title.clone(),
        abstract_text: profile.abstract_text.clone(),
    };
    let mut store = store.write().await;
    if !store.update(&profile.pk, update) {
        store.add(profile);
    }
}

/// One ingestion record per paper, grouped by publication day (`YYYY-MM-DD`).
pub fn group_by_published_date(results: &[SearchResult]) -> BTreeMap<String, Vec<RawPaperRecord>> {
    let mut groups: BTreeMap<String, Vec<RawPaperRecord>> = BTreeMap::new();
    for result in results {
        let profile = result.to_profile();
        groups
            .entry(result.published.format("%Y-%m-%d").to_string())
            .or_default()
            .push(RawPaperRecord {
                pk: Some(profile.pk),
                title: profile.title,
                abstract_text: profile.abstract_text,
            });
    }
    groups
}

//! Source resolution and introduction extraction.
//!
//! A paper reference (bare arXiv id, abstract page, PDF link, review-site
//! link) is normalized into a [`PaperReference`], then handed to an ordered
//! list of [`ExtractionStrategy`] implementations. The first strategy that
//! yields text wins; failures fall through to the next strategy.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, instrument};
use url::Url;

use papertrail_fetch::Fetcher;
use papertrail_shared::{PaperTrailError, ResolverConfig, Result, SectionMap};

use crate::pdf::{extract_pdf_text, find_introduction};
use crate::sections::parse_sections;

// ---------------------------------------------------------------------------
// PaperReference
// ---------------------------------------------------------------------------

static ARXIV_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{4}\.\d{4,5}|[a-z][a-z\-]*(?:\.[A-Z]{2})?/\d{7})(?:v\d+)?$")
        .expect("valid regex")
});
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v\d+$").expect("valid regex"));

/// A normalized paper reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaperReference {
    /// arXiv paper; `id` keeps any version suffix given by the caller.
    Arxiv { id: String },
    /// OpenReview submission.
    OpenReview { id: String },
    /// Direct link to a PDF on any other host.
    PdfUrl(Url),
    /// Any other web page.
    HtmlUrl(Url),
}

impl PaperReference {
    /// Classify a raw reference string.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if let Ok(url) = Url::parse(input) {
            if matches!(url.scheme(), "http" | "https") {
                return Ok(Self::from_url(url));
            }
        }

        let bare = input
            .strip_prefix("arXiv:")
            .or_else(|| input.strip_prefix("arxiv:"))
            .unwrap_or(input);
        if ARXIV_ID_RE.is_match(bare) {
            return Ok(Self::Arxiv {
                id: bare.to_string(),
            });
        }

        Err(PaperTrailError::validation(format!(
            "unrecognized paper reference: {input:?}"
        )))
    }

    fn from_url(url: Url) -> Self {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

        if host == "arxiv.org" || host.ends_with(".arxiv.org") {
            if let Some(id) = arxiv_id_from_path(url.path()) {
                return Self::Arxiv { id };
            }
        }

        if host == "openreview.net" || host.ends_with(".openreview.net") {
            if matches!(url.path(), "/pdf" | "/forum") {
                if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "id") {
                    return Self::OpenReview { id: id.into_owned() };
                }
            }
        }

        if url.path().to_ascii_lowercase().ends_with(".pdf") {
            Self::PdfUrl(url)
        } else {
            Self::HtmlUrl(url)
        }
    }

    /// Stable identifier: version-less arXiv id, OpenReview id, or the URL.
    pub fn canonical_id(&self) -> String {
        match self {
            Self::Arxiv { id } => VERSION_RE.replace(id, "").into_owned(),
            Self::OpenReview { id } => id.clone(),
            Self::PdfUrl(url) | Self::HtmlUrl(url) => url.to_string(),
        }
    }

    /// The arXiv id, if this is an arXiv reference.
    pub fn arxiv_id(&self) -> Option<&str> {
        match self {
            Self::Arxiv { id } => Some(id),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaperReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arxiv { id } => write!(f, "arXiv:{id}"),
            Self::OpenReview { id } => write!(f, "openreview:{id}"),
            Self::PdfUrl(url) | Self::HtmlUrl(url) => write!(f, "{url}"),
        }
    }
}

/// `/abs/<id>`, `/pdf/<id>[.pdf]`, `/html/<id>` → `<id>`.
fn arxiv_id_from_path(path: &str) -> Option<String> {
    let rest = ["/abs/", "/pdf/", "/html/"]
        .iter()
        .find_map(|prefix| path.strip_prefix(prefix))?;
    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".pdf").unwrap_or(rest);
    ARXIV_ID_RE.is_match(rest).then(|| rest.to_string())
}

fn join_base(base: &str, tail: &str) -> Option<Url> {
    Url::parse(&format!("{}/{tail}", base.trim_end_matches('/'))).ok()
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// One way of getting an introduction out of a paper.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Short name for logs and reports.
    fn name(&self) -> &'static str;

    /// The document this strategy would read for `reference`, or `None` when
    /// the strategy does not apply.
    fn locate(&self, reference: &PaperReference) -> Option<Url>;

    /// Fetch `url` and extract the introduction. `Ok(None)` means the
    /// document was read but holds no recognizable introduction.
    async fn extract_introduction(&self, fetcher: &Fetcher, url: &Url) -> Result<Option<String>>;
}

/// Reads the paper's HTML rendering and picks the introduction section.
#[derive(Debug, Clone)]
pub struct HtmlRenderStrategy {
    arxiv_base: String,
}

impl HtmlRenderStrategy {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            arxiv_base: config.arxiv_base.clone(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for HtmlRenderStrategy {
    fn name(&self) -> &'static str {
        "html"
    }

    fn locate(&self, reference: &PaperReference) -> Option<Url> {
        match reference {
            PaperReference::Arxiv { id } => join_base(&self.arxiv_base, &format!("html/{id}")),
            PaperReference::HtmlUrl(url) => Some(url.clone()),
            PaperReference::OpenReview { .. } | PaperReference::PdfUrl(_) => None,
        }
    }

    async fn extract_introduction(&self, fetcher: &Fetcher, url: &Url) -> Result<Option<String>> {
        let sections = fetch_sections(fetcher, url).await?;
        Ok(introduction_from_sections(&sections))
    }
}

/// Downloads the PDF and scans its text for the introduction.
#[derive(Debug, Clone)]
pub struct PdfTextStrategy {
    arxiv_base: String,
    openreview_base: String,
}

impl PdfTextStrategy {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            arxiv_base: config.arxiv_base.clone(),
            openreview_base: config.openreview_base.clone(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for PdfTextStrategy {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn locate(&self, reference: &PaperReference) -> Option<Url> {
        match reference {
            PaperReference::Arxiv { id } => join_base(&self.arxiv_base, &format!("pdf/{id}")),
            PaperReference::OpenReview { id } => {
                let mut url = join_base(&self.openreview_base, "pdf")?;
                url.query_pairs_mut().append_pair("id", id);
                Some(url)
            }
            PaperReference::PdfUrl(url) => Some(url.clone()),
            PaperReference::HtmlUrl(_) => None,
        }
    }

    async fn extract_introduction(&self, fetcher: &Fetcher, url: &Url) -> Result<Option<String>> {
        let doc = fetcher.fetch(url).await?;
        if !doc.is_pdf() {
            return Err(PaperTrailError::parse(format!("{url}: response is not a PDF")));
        }

        let text = tokio::task::spawn_blocking(move || extract_pdf_text(&doc.body))
            .await
            .map_err(|e| PaperTrailError::parse(format!("PDF extraction task failed: {e}")))??;

        Ok(find_introduction(&text))
    }
}

async fn fetch_sections(fetcher: &Fetcher, url: &Url) -> Result<SectionMap> {
    let doc = fetcher.fetch(url).await?;
    if doc.is_pdf() {
        return Err(PaperTrailError::parse(format!(
            "{url}: expected an HTML rendering, got a PDF"
        )));
    }
    Ok(parse_sections(&doc.text()))
}

fn introduction_from_sections(sections: &SectionMap) -> Option<String> {
    static INTRO_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(\d+\.?|[IVX]+\.?)?\s*Introduction").expect("valid regex")
    });

    sections
        .find(|heading| INTRO_RE.is_match(heading))
        .filter(|section| !section.body.trim().is_empty())
        .map(|section| format!("{}\n\n{}", section.heading, section.body))
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// One strategy's failed try, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    pub strategy: &'static str,
    pub url: Option<Url>,
    /// `None` when the document was read but had no introduction.
    pub error: Option<String>,
}

/// Full record of one `extract_introduction` call.
#[derive(Debug, Clone)]
pub struct IntroductionOutcome {
    pub reference: Option<PaperReference>,
    pub text: Option<String>,
    /// Name of the strategy that produced `text`.
    pub strategy: Option<&'static str>,
    /// Strategies tried before success (or all of them, on failure).
    pub attempts: Vec<StrategyAttempt>,
}

/// Resolves paper references and runs the extraction strategies in order.
pub struct SourceResolver {
    fetcher: Fetcher,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl SourceResolver {
    /// Resolver with the default chain: HTML rendering, then PDF text.
    pub fn new(fetcher: Fetcher, config: &ResolverConfig) -> Self {
        Self::with_strategies(
            fetcher,
            vec![
                Box::new(HtmlRenderStrategy::new(config)),
                Box::new(PdfTextStrategy::new(config)),
            ],
        )
    }

    /// Resolver with a caller-supplied strategy chain, tried in order.
    pub fn with_strategies(fetcher: Fetcher, strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self {
            fetcher,
            strategies,
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Names of the configured strategies, in order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Fetch an HTML rendering and split it into sections.
    ///
    /// Best effort: fetch failures and pages without headings yield `None`.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn extract_sections(&self, url: &Url) -> Option<SectionMap> {
        match fetch_sections(&self.fetcher, url).await {
            Ok(sections) if !sections.is_empty() => {
                debug!(count = sections.len(), "parsed sections");
                Some(sections)
            }
            Ok(_) => {
                debug!("no recognizable section headings");
                None
            }
            Err(e) => {
                debug!(error = %e, "section extraction failed");
                None
            }
        }
    }

    /// Extract the introduction of any supported reference.
    pub async fn extract_introduction(&self, reference: &str) -> Option<String> {
        self.extract_introduction_traced(reference).await.text
    }

    /// Like [`extract_introduction`](Self::extract_introduction), but reports
    /// which strategy succeeded and why the others failed.
    #[instrument(skip_all, fields(reference = %reference))]
    pub async fn extract_introduction_traced(&self, reference: &str) -> IntroductionOutcome {
        match PaperReference::parse(reference) {
            Ok(parsed) => self.introduction_for(parsed).await,
            Err(e) => {
                debug!(error = %e, "reference not resolvable");
                IntroductionOutcome {
                    reference: None,
                    text: None,
                    strategy: None,
                    attempts: Vec::new(),
                }
            }
        }
    }

    /// Run the strategy chain for an already-classified reference.
    pub async fn introduction_for(&self, reference: PaperReference) -> IntroductionOutcome {
        let mut outcome = IntroductionOutcome {
            reference: None,
            text: None,
            strategy: None,
            attempts: Vec::new(),
        };

        for strategy in &self.strategies {
            let Some(url) = strategy.locate(&reference) else {
                continue;
            };

            match strategy.extract_introduction(&self.fetcher, &url).await {
                Ok(Some(text)) => {
                    info!(strategy = strategy.name(), chars = text.len(), "introduction extracted");
                    outcome.text = Some(text);
                    outcome.strategy = Some(strategy.name());
                    break;
                }
                Ok(None) => {
                    debug!(strategy = strategy.name(), %url, "no introduction found");
                    outcome.attempts.push(StrategyAttempt {
                        strategy: strategy.name(),
                        url: Some(url),
                        error: None,
                    });
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), %url, error = %e, "strategy failed");
                    outcome.attempts.push(StrategyAttempt {
                        strategy: strategy.name(),
                        url: Some(url),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        outcome.reference = Some(reference);
        outcome
    }
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("fetcher", &self.fetcher)
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

//! arXiv search client (Atom query API).

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use tracing::{debug, instrument, warn};
use url::Url;

use papertrail_fetch::Fetcher;
use papertrail_shared::{PaperTrailError, Result, SearchConfig, SearchResult};

/// Archives that are valid `cat:` values without a subject suffix.
const BARE_ARCHIVES: &[&str] = &[
    "astro-ph", "cond-mat", "gr-qc", "hep-ex", "hep-lat", "hep-ph", "hep-th", "math-ph", "nlin",
    "nucl-ex", "nucl-th", "physics", "quant-ph",
];

static CATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z\-]*\.[A-Za-z\-]+$").expect("valid regex"));
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v\d+$").expect("valid regex"));

/// Query client for the arXiv Atom API.
#[derive(Debug, Clone)]
pub struct SearchClient {
    fetcher: Fetcher,
    config: SearchConfig,
}

impl SearchClient {
    pub fn new(fetcher: Fetcher, config: SearchConfig) -> Self {
        Self { fetcher, config }
    }

    /// Most recent submissions in `domain`, newest first as delivered by the API.
    #[instrument(skip(self))]
    pub async fn search_recent(&self, max_results: usize, domain: &str) -> Result<Vec<SearchResult>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let url = self.query_url(&[
            ("search_query", domain_clause(domain)),
            ("sortBy", "submittedDate".into()),
            ("sortOrder", "descending".into()),
            ("start", "0".into()),
            ("max_results", max_results.to_string()),
        ])?;
        self.run(&url).await
    }

    /// Keyword search for `query`, scoped to `domain`, ordered by relevance.
    #[instrument(skip(self))]
    pub async fn search_related(
        &self,
        num_results: usize,
        query: &str,
        domain: &str,
    ) -> Result<Vec<SearchResult>> {
        if num_results == 0 {
            return Ok(Vec::new());
        }
        let search = if query.trim() == domain.trim() {
            domain_clause(domain)
        } else {
            format!("{} AND {}", text_clause(query), domain_clause(domain))
        };
        let url = self.query_url(&[
            ("search_query", search),
            ("sortBy", "relevance".into()),
            ("sortOrder", "descending".into()),
            ("start", "0".into()),
            ("max_results", num_results.to_string()),
        ])?;
        self.run(&url).await
    }

    /// Resolve a single arXiv identifier.
    #[instrument(skip(self))]
    pub async fn fetch_by_identifier(&self, identifier: &str) -> Result<SearchResult> {
        let id = identifier
            .trim()
            .trim_start_matches("arXiv:")
            .trim_start_matches("arxiv:");
        if id.is_empty() {
            return Err(PaperTrailError::validation("empty arXiv identifier"));
        }

        let url = self.query_url(&[("id_list", id.to_string()), ("max_results", "1".into())])?;
        self.run(&url)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PaperTrailError::not_found(format!("arXiv:{id}")))
    }

    fn query_url(&self, params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| {
            PaperTrailError::config(format!("invalid search base_url {:?}: {e}", self.config.base_url))
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn run(&self, url: &Url) -> Result<Vec<SearchResult>> {
        let doc = self.fetcher.fetch(url).await?;
        let results = parse_feed(&doc.text())?;
        debug!(count = results.len(), "search returned");
        Ok(results)
    }
}

/// `cat:<domain>` for arXiv category tokens, otherwise a full-text clause.
fn domain_clause(domain: &str) -> String {
    let domain = domain.trim();
    if CATEGORY_RE.is_match(domain) || BARE_ARCHIVES.contains(&domain) {
        format!("cat:{domain}")
    } else {
        text_clause(domain)
    }
}

fn text_clause(text: &str) -> String {
    let text = text.trim();
    if text.contains(char::is_whitespace) {
        format!("all:\"{text}\"")
    } else {
        format!("all:{text}")
    }
}

/// Canonical identifier from an entry id (`http://arxiv.org/abs/2409.16928v1` → `2409.16928`).
pub fn identifier_from_entry_id(entry_id: &str) -> String {
    let id = entry_id
        .split_once("/abs/")
        .map_or(entry_id, |(_, rest)| rest)
        .trim_end_matches('/');
    VERSION_RE.replace(id, "").into_owned()
}

// ---------------------------------------------------------------------------
// Atom parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    primary_category: Option<String>,
    first_category: Option<String>,
    authors: Vec<String>,
    author_name: String,
    pdf_url: Option<String>,
}

impl EntryBuilder {
    fn on_element(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"link" => {
                if attr(e, b"title").as_deref() == Some("pdf") {
                    self.pdf_url = attr(e, b"href");
                }
            }
            b"primary_category" => self.primary_category = attr(e, b"term"),
            b"category" if self.first_category.is_none() => self.first_category = attr(e, b"term"),
            _ => {}
        }
    }

    fn build(self) -> Result<Option<SearchResult>> {
        let id = self.id.trim();
        if id.contains("/api/errors") {
            return Err(PaperTrailError::Retrieval(format!(
                "search API error: {}",
                collapse(&self.summary)
            )));
        }
        if id.is_empty() {
            warn!("skipping search entry without an id");
            return Ok(None);
        }

        let published = match DateTime::parse_from_rfc3339(self.published.trim()) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                warn!(id, error = %e, "skipping search entry with invalid published date");
                return Ok(None);
            }
        };

        Ok(Some(SearchResult {
            title: collapse(&self.title),
            url: id.to_string(),
            summary: collapse(&self.summary),
            category: self
                .primary_category
                .or(self.first_category)
                .unwrap_or_default(),
            published,
            identifier: identifier_from_entry_id(id),
            authors: self.authors,
            pdf_url: self.pdf_url,
        }))
    }
}

/// Parse an Atom feed into search results, in feed order.
pub fn parse_feed(xml: &str) -> Result<Vec<SearchResult>> {
    let mut reader = Reader::from_str(xml);
    let mut results = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut path: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"entry" {
                    entry = Some(EntryBuilder::default());
                } else if let Some(builder) = entry.as_mut() {
                    builder.on_element(&e);
                    if name == b"author" {
                        builder.author_name.clear();
                    }
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if let Some(builder) = entry.as_mut() {
                    builder.on_element(&e);
                }
            }
            Ok(Event::Text(e)) => {
                let Some(builder) = entry.as_mut() else {
                    continue;
                };
                let text = e.unescape().map_err(|e| {
                    PaperTrailError::Retrieval(format!("malformed search response: {e}"))
                })?;
                match path.last().map(Vec::as_slice) {
                    Some(b"id") => builder.id.push_str(&text),
                    Some(b"title") => builder.title.push_str(&text),
                    Some(b"summary") => builder.summary.push_str(&text),
                    Some(b"published") => builder.published.push_str(&text),
                    Some(b"name") => builder.author_name.push_str(&text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                path.pop();
                match e.local_name().as_ref() {
                    b"entry" => {
                        if let Some(builder) = entry.take() {
                            if let Some(result) = builder.build()? {
                                results.push(result);
                            }
                        }
                    }
                    b"author" => {
                        if let Some(builder) = entry.as_mut() {
                            let name = collapse(&builder.author_name);
                            if !name.is_empty() {
                                builder.authors.push(name);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PaperTrailError::Retrieval(format!(
                    "malformed search response at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    Ok(results)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use papertrail_shared::FetchConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("../../../fixtures/atom/{name}")).expect("fixture")
    }

    fn client_for(server: &MockServer) -> SearchClient {
        let fetcher = Fetcher::new(FetchConfig {
            timeout_secs: 5,
            rate_limit_ms: 0,
            max_redirects: 5,
            allow_private_hosts: true,
        })
        .unwrap();
        SearchClient::new(
            fetcher,
            SearchConfig {
                base_url: format!("{}/api/query", server.uri()),
            },
        )
    }

    fn atom(body: String) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "application/atom+xml")
    }

    #[test]
    fn parses_feed_entries() {
        let results = parse_feed(&fixture("cs-ai-recent.xml")).unwrap();
        assert_eq!(results.len(), 2);

        let first = &results[0];
        assert_eq!(first.title, "Paper 1: Learning to Simulate Research Communities");
        assert_eq!(first.url, "http://arxiv.org/abs/2409.16928v1");
        assert_eq!(first.identifier, "2409.16928");
        assert_eq!(first.summary, "Summary 1 spans several lines.");
        assert_eq!(first.category, "cs.AI");
        assert_eq!(first.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(first.pdf_url.as_deref(), Some("http://arxiv.org/pdf/2409.16928v1"));
        assert_eq!(first.published.to_rfc3339(), "2024-09-25T13:19:21+00:00");

        let second = &results[1];
        assert_eq!(second.summary, "Summary 2 & more.");
        // No primary_category element: first category wins.
        assert_eq!(second.category, "cs.LG");
    }

    #[test]
    fn api_error_entry_is_retrieval_error() {
        let err = parse_feed(&fixture("api-error.xml")).unwrap_err();
        assert!(err.is_retrieval());
        assert!(err.to_string().contains("incorrect id format"));
    }

    #[test]
    fn malformed_xml_is_retrieval_error() {
        let err = parse_feed("<feed><entry><id>x</entry></feed>").unwrap_err();
        assert!(err.is_retrieval());
    }

    #[test]
    fn domain_clause_detects_categories() {
        assert_eq!(domain_clause("cs.AI"), "cat:cs.AI");
        assert_eq!(domain_clause("hep-th"), "cat:hep-th");
        assert_eq!(domain_clause("graph neural networks"), "all:\"graph neural networks\"");
        assert_eq!(domain_clause("transformers"), "all:transformers");
    }

    #[test]
    fn entry_id_to_identifier() {
        assert_eq!(identifier_from_entry_id("http://arxiv.org/abs/2409.16928v12"), "2409.16928");
        assert_eq!(identifier_from_entry_id("http://arxiv.org/abs/cs/0112017v1"), "cs/0112017");
    }

    #[tokio::test]
    async fn search_recent_preserves_source_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "cat:cs.AI"))
            .and(query_param("sortBy", "submittedDate"))
            .and(query_param("sortOrder", "descending"))
            .and(query_param("max_results", "2"))
            .respond_with(atom(fixture("cs-ai-recent.xml")))
            .expect(1)
            .mount(&server)
            .await;

        let results = client_for(&server).search_recent(2, "cs.AI").await.unwrap();
        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["http://arxiv.org/abs/2409.16928v1", "http://arxiv.org/abs/2409.17012v2"]
        );
    }

    #[tokio::test]
    async fn search_related_scopes_query_to_domain() {
        let server = MockServer::start().await;
        Mock::given(path("/api/query"))
            .and(query_param("search_query", "all:\"relational learning\" AND cat:cs.LG"))
            .and(query_param("sortBy", "relevance"))
            .and(query_param("max_results", "5"))
            .respond_with(atom(fixture("cs-ai-recent.xml")))
            .expect(1)
            .mount(&server)
            .await;

        let results = client_for(&server)
            .search_related(5, "relational learning", "cs.LG")
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn search_related_collapses_identical_terms() {
        let server = MockServer::start().await;
        Mock::given(path("/api/query"))
            .and(query_param("search_query", "cat:cs.AI"))
            .and(query_param("sortBy", "relevance"))
            .respond_with(atom(fixture("empty.xml")))
            .expect(1)
            .mount(&server)
            .await;

        let results = client_for(&server)
            .search_related(3, "cs.AI", "cs.AI")
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn fetch_by_identifier_returns_first_entry() {
        let server = MockServer::start().await;
        Mock::given(path("/api/query"))
            .and(query_param("id_list", "2409.16928"))
            .respond_with(atom(fixture("cs-ai-recent.xml")))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .fetch_by_identifier("arXiv:2409.16928")
            .await
            .unwrap();
        assert_eq!(result.identifier, "2409.16928");
    }

    #[tokio::test]
    async fn fetch_by_identifier_zero_matches_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(path("/api/query"))
            .respond_with(atom(fixture("empty.xml")))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_by_identifier("9999.99999")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn server_error_is_retrieval_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/query"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).search_recent(2, "cs.AI").await.unwrap_err();
        assert!(err.is_retrieval());
    }

    #[tokio::test]
    async fn zero_results_requested_skips_network() {
        let server = MockServer::start().await;
        Mock::given(path("/api/query"))
            .respond_with(atom(fixture("empty.xml")))
            .expect(0)
            .mount(&server)
            .await;

        let results = client_for(&server).search_recent(0, "cs.AI").await.unwrap();
        assert!(results.is_empty());
    }
}

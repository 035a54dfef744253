//! HTTP document retrieval shared by every external call.
//!
//! The [`Fetcher`] owns one `reqwest` client, applies a per-request timeout,
//! spaces requests to the same host, and refuses URLs that point at private
//! network resources. It performs no parsing.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};
use url::Url;

use papertrail_shared::{FetchConfig, PaperTrailError, Result};

/// User-Agent string for all outbound requests.
const USER_AGENT: &str = concat!("PaperTrail/", env!("CARGO_PKG_VERSION"));

/// Maximum response size we accept (50 MB).
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

// ---------------------------------------------------------------------------
// FetchedDocument
// ---------------------------------------------------------------------------

/// Raw result of a successful GET.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// Final URL after redirects.
    pub url: Url,
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl FetchedDocument {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Whether the body is a PDF (by content type or magic bytes).
    pub fn is_pdf(&self) -> bool {
        let declared = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/pdf"));
        declared || self.body.starts_with(b"%PDF-")
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Rate-limited, timeout-bounded HTTP fetcher. Cheap to clone; clones share
/// the client and the per-host limiter.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    limiter: Option<Arc<DefaultKeyedRateLimiter<String>>>,
    config: FetchConfig,
    max_body_bytes: usize,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").field("config", &self.config).finish()
    }
}

impl Fetcher {
    /// Create a fetcher with the given policy.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaperTrailError::Retrieval(format!("failed to build HTTP client: {e}")))?;

        let limiter = Quota::with_period(Duration::from_millis(config.rate_limit_ms))
            .map(|quota| Arc::new(RateLimiter::keyed(quota)));

        Ok(Self {
            client,
            limiter,
            config,
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    /// Lower or raise the body size cap (default 50 MB).
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// The policy this fetcher was built with.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// GET `url` and return its body.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedDocument> {
        self.fetch_with_headers(url, &[]).await
    }

    /// GET `url` with extra request headers (API keys, `Accept`).
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch_with_headers(
        &self,
        url: &Url,
        headers: &[(&'static str, String)],
    ) -> Result<FetchedDocument> {
        if !self.config.allow_private_hosts && is_ssrf_target(url) {
            return Err(PaperTrailError::validation(format!(
                "{url}: refusing to fetch a private or non-HTTP address"
            )));
        }

        self.wait_for_host(url).await;

        let start = Instant::now();
        let mut request = self.client.get(url.as_str());
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let mut response = request.send().await.map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PaperTrailError::Retrieval(format!("{url}: HTTP {status}")));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.transport_error(url, e))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(PaperTrailError::Retrieval(format!(
                    "{url}: response exceeds {} bytes",
                    self.max_body_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "fetched document"
        );

        Ok(FetchedDocument {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }

    /// Block until the per-host limiter admits a request to `url`'s host.
    async fn wait_for_host(&self, url: &Url) {
        if let Some(limiter) = &self.limiter {
            let host = host_key(url);
            limiter.until_key_ready(&host).await;
        }
    }

    fn transport_error(&self, url: &Url, e: reqwest::Error) -> PaperTrailError {
        if e.is_timeout() {
            PaperTrailError::Retrieval(format!(
                "{url}: timed out after {}s",
                self.config.timeout_secs
            ))
        } else {
            PaperTrailError::Retrieval(format!("{url}: {e}"))
        }
    }
}

/// Rate-limit key: host plus explicit port.
fn host_key(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_config() -> FetchConfig {
        FetchConfig {
            timeout_secs: 5,
            rate_limit_ms: 0,
            max_redirects: 5,
            allow_private_hosts: true,
        }
    }

    #[test]
    fn test_ssrf_protection() {
        for blocked in [
            "file:///etc/passwd",
            "http://192.168.1.1/admin",
            "http://10.0.0.1/",
            "http://127.0.0.1:8080/",
            "http://localhost:3000/api",
            "http://[::1]/",
        ] {
            let url = Url::parse(blocked).unwrap();
            assert!(is_ssrf_target(&url), "{blocked} should be blocked");
        }

        let url = Url::parse("https://arxiv.org/abs/2409.16928").unwrap();
        assert!(!is_ssrf_target(&url));
    }

    #[test]
    fn test_host_key_includes_port() {
        let url = Url::parse("http://127.0.0.1:8080/x").unwrap();
        assert_eq!(host_key(&url), "127.0.0.1:8080");
        let url = Url::parse("https://arxiv.org/pdf/1").unwrap();
        assert_eq!(host_key(&url), "arxiv.org");
    }

    #[tokio::test]
    async fn fetch_returns_body_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>hello</body></html>", "text/html; charset=utf-8"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(local_config()).unwrap();
        let url = Url::parse(&format!("{}/doc", server.uri())).unwrap();
        let doc = fetcher.fetch(&url).await.expect("fetch");

        assert_eq!(doc.status, 200);
        assert!(doc.text().contains("hello"));
        assert!(!doc.is_pdf());
        assert_eq!(doc.content_type.as_deref(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn fetch_detects_pdf_by_magic_bytes() {
        let server = MockServer::start().await;
        Mock::given(path("/paper"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"%PDF-1.5\n...".to_vec(), "application/octet-stream"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(local_config()).unwrap();
        let url = Url::parse(&format!("{}/paper", server.uri())).unwrap();
        assert!(fetcher.fetch(&url).await.unwrap().is_pdf());
    }

    #[tokio::test]
    async fn non_success_status_is_retrieval_error() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(local_config()).unwrap();
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(err.is_retrieval());
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn oversized_body_is_retrieval_error() {
        let server = MockServer::start().await;
        Mock::given(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 4096]))
            .mount(&server)
            .await;
        Mock::given(path("/small"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 512]))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(local_config()).unwrap().with_max_body_bytes(1024);

        let url = Url::parse(&format!("{}/big", server.uri())).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(err.is_retrieval());
        assert!(err.to_string().contains("exceeds 1024 bytes"));

        let url = Url::parse(&format!("{}/small", server.uri())).unwrap();
        assert_eq!(fetcher.fetch(&url).await.unwrap().body.len(), 512);
    }

    #[tokio::test]
    async fn timeout_is_retrieval_error() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let config = FetchConfig {
            timeout_secs: 1,
            ..local_config()
        };
        let fetcher = Fetcher::new(config).unwrap();
        let url = Url::parse(&format!("{}/slow", server.uri())).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(err.is_retrieval());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn private_hosts_blocked_by_default() {
        let server = MockServer::start().await;
        let fetcher = Fetcher::new(FetchConfig {
            allow_private_hosts: false,
            ..local_config()
        })
        .unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, PaperTrailError::Validation { .. }));
    }

    #[tokio::test]
    async fn extra_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(path("/api"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(local_config()).unwrap();
        let url = Url::parse(&format!("{}/api", server.uri())).unwrap();
        fetcher
            .fetch_with_headers(&url, &[("x-api-key", "secret".to_string())])
            .await
            .expect("fetch with header");
    }

    #[tokio::test]
    async fn same_host_requests_are_spaced() {
        let server = MockServer::start().await;
        Mock::given(path("/tick"))
            .respond_with(ResponseTemplate::new(200))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(FetchConfig {
            rate_limit_ms: 150,
            ..local_config()
        })
        .unwrap();
        let url = Url::parse(&format!("{}/tick", server.uri())).unwrap();

        let start = Instant::now();
        for _ in 0..3 {
            fetcher.fetch(&url).await.unwrap();
        }
        // First request passes immediately, the next two wait one period each.
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}

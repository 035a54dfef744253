//! Application configuration for PaperTrail.
//!
//! User config lives at `~/.papertrail/papertrail.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PaperTrailError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "papertrail.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".papertrail";

// ---------------------------------------------------------------------------
// Config structs (matching papertrail.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// HTTP fetch policy shared by every external call.
    #[serde(default)]
    pub fetch: FetchSection,

    /// Scholarly search API settings.
    #[serde(default)]
    pub search: SearchSection,

    /// Citation-graph API settings.
    #[serde(default)]
    pub citations: CitationSection,

    /// Paper hosting sites used by the source resolver.
    #[serde(default)]
    pub hosts: HostsSection,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path of the persisted profile store (`~` expands to the home directory).
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Maximum number of papers acquired in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Whether batch acquisition also extracts introductions.
    #[serde(default = "default_true")]
    pub extract_introductions: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            concurrency: default_concurrency(),
            extract_introductions: true,
        }
    }
}

fn default_store_path() -> String {
    "~/.papertrail/papers.json".into()
}
fn default_concurrency() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    /// Timeout applied to every external request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum ms between requests to the same host.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Allow loopback/private hosts (local mirrors, mock servers).
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            rate_limit_ms: default_rate_limit(),
            max_redirects: default_max_redirects(),
            allow_private_hosts: false,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_rate_limit() -> u64 {
    500
}
fn default_max_redirects() -> usize {
    5
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    /// arXiv Atom query endpoint.
    #[serde(default = "default_search_url")]
    pub base_url: String,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
        }
    }
}

fn default_search_url() -> String {
    "https://export.arxiv.org/api/query".into()
}

/// `[citations]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationSection {
    /// Semantic Scholar Graph API root.
    #[serde(default = "default_citation_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Maximum references requested per paper.
    #[serde(default = "default_reference_limit")]
    pub limit: u32,
}

impl Default for CitationSection {
    fn default() -> Self {
        Self {
            base_url: default_citation_url(),
            api_key_env: default_api_key_env(),
            limit: default_reference_limit(),
        }
    }
}

fn default_citation_url() -> String {
    "https://api.semanticscholar.org/graph/v1".into()
}
fn default_api_key_env() -> String {
    "SEMANTIC_SCHOLAR_API_KEY".into()
}
fn default_reference_limit() -> u32 {
    100
}

/// `[hosts]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsSection {
    /// arXiv site root serving `/abs`, `/html` and `/pdf` renderings.
    #[serde(default = "default_arxiv_base")]
    pub arxiv_base: String,

    /// OpenReview site root serving `/pdf?id=`.
    #[serde(default = "default_openreview_base")]
    pub openreview_base: String,
}

impl Default for HostsSection {
    fn default() -> Self {
        Self {
            arxiv_base: default_arxiv_base(),
            openreview_base: default_openreview_base(),
        }
    }
}

fn default_arxiv_base() -> String {
    "https://arxiv.org".into()
}
fn default_openreview_base() -> String {
    "https://openreview.net".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (derived from AppConfig, overridable by CLI flags)
// ---------------------------------------------------------------------------

/// Runtime HTTP fetch policy.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Minimum ms between requests to the same host (0 disables).
    pub rate_limit_ms: u64,
    /// Maximum redirects followed.
    pub max_redirects: usize,
    /// Allow loopback/private hosts.
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.fetch.timeout_secs,
            rate_limit_ms: config.fetch.rate_limit_ms,
            max_redirects: config.fetch.max_redirects,
            allow_private_hosts: config.fetch.allow_private_hosts,
        }
    }
}

/// Runtime search client settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// arXiv Atom query endpoint.
    pub base_url: String,
}

impl From<&AppConfig> for SearchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.search.base_url.clone(),
        }
    }
}

/// Runtime citation client settings.
#[derive(Debug, Clone)]
pub struct CitationConfig {
    /// Graph API root.
    pub base_url: String,
    /// Env var holding the optional API key.
    pub api_key_env: String,
    /// Maximum references requested per paper.
    pub limit: u32,
}

impl CitationConfig {
    /// Read the API key from the configured env var. Empty or unset means anonymous access.
    pub fn api_key(&self) -> Option<String> {
        match std::env::var(&self.api_key_env) {
            Ok(val) if !val.trim().is_empty() => Some(val),
            _ => None,
        }
    }
}

impl From<&AppConfig> for CitationConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.citations.base_url.clone(),
            api_key_env: config.citations.api_key_env.clone(),
            limit: config.citations.limit,
        }
    }
}

/// Runtime source resolver settings.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// arXiv site root.
    pub arxiv_base: String,
    /// OpenReview site root.
    pub openreview_base: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ResolverConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            arxiv_base: config.hosts.arxiv_base.clone(),
            openreview_base: config.hosts.openreview_base.clone(),
        }
    }
}

/// Runtime batch acquisition settings.
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    /// Maximum papers acquired in parallel.
    pub concurrency: u32,
    /// Whether to extract introductions for each candidate.
    pub extract_introductions: bool,
}

impl From<&AppConfig> for AcquireConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.defaults.concurrency.max(1),
            extract_introductions: config.defaults.extract_introductions,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.papertrail/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PaperTrailError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.papertrail/papertrail.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PaperTrailError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PaperTrailError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PaperTrailError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PaperTrailError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PaperTrailError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| PaperTrailError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("store_path"));
        assert!(toml_str.contains("SEMANTIC_SCHOLAR_API_KEY"));
        assert!(toml_str.contains("export.arxiv.org"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.concurrency, 4);
        assert_eq!(parsed.fetch.timeout_secs, 30);
        assert_eq!(parsed.citations.api_key_env, "SEMANTIC_SCHOLAR_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
concurrency = 8

[fetch]
rate_limit_ms = 0
allow_private_hosts = true

[hosts]
arxiv_base = "http://localhost:9000"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.concurrency, 8);
        assert!(config.defaults.extract_introductions);
        assert_eq!(config.fetch.rate_limit_ms, 0);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.hosts.arxiv_base, "http://localhost:9000");
        assert_eq!(config.hosts.openreview_base, "https://openreview.net");
    }

    #[test]
    fn runtime_configs_from_app_config() {
        let app = AppConfig::default();
        let fetch = FetchConfig::from(&app);
        assert_eq!(fetch.timeout_secs, 30);
        assert_eq!(fetch.rate_limit_ms, 500);
        assert!(!fetch.allow_private_hosts);

        let acquire = AcquireConfig::from(&app);
        assert_eq!(acquire.concurrency, 4);

        let resolver = ResolverConfig::from(&app);
        assert_eq!(resolver.arxiv_base, "https://arxiv.org");
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let mut app = AppConfig::default();
        app.defaults.concurrency = 0;
        assert_eq!(AcquireConfig::from(&app).concurrency, 1);
    }

    #[test]
    fn api_key_absent_when_env_unset() {
        let mut app = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        app.citations.api_key_env = "PT_TEST_NONEXISTENT_KEY_12345".into();
        let citations = CitationConfig::from(&app);
        assert!(citations.api_key().is_none());
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(
            expand_home("/tmp/papers.json").unwrap(),
            PathBuf::from("/tmp/papers.json")
        );
        let expanded = expand_home("~/papers.json").unwrap();
        assert!(expanded.ends_with("papers.json"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
}

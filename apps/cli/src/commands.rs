//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use papertrail_core::{
    Acquirer, BatchProgress, BatchReport, CandidateStatus, SharedStore, group_by_published_date,
    shared,
};
use papertrail_shared::{AppConfig, SearchResult, expand_home, init_config, load_config};
use papertrail_store::{PaperProfileStore, PaperQuery};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// PaperTrail: acquire scholarly papers into a local profile store.
#[derive(Parser)]
#[command(
    name = "papertrail",
    version,
    about = "Search arXiv, follow citations, extract introductions, and keep a paper profile store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Paper store file (defaults to `defaults.store_path` from the config).
    #[arg(long, global = true, env = "PAPERTRAIL_STORE")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Query the arXiv search API.
    Search {
        #[command(subcommand)]
        action: SearchAction,
    },

    /// Show the metadata of one arXiv paper.
    Paper {
        /// arXiv identifier (e.g. 2409.16928).
        identifier: String,
    },

    /// List the papers cited by a paper.
    References {
        /// arXiv identifier or Semantic Scholar paper id.
        identifier: String,

        /// Also acquire every cited arXiv paper into the store.
        #[arg(long)]
        acquire: bool,
    },

    /// Print the section headings of an HTML paper rendering.
    Sections {
        /// URL of the HTML rendering.
        url: String,
    },

    /// Extract the introduction of a paper (arXiv id, abstract page, PDF or review-site link).
    Intro {
        reference: String,
    },

    /// Search a domain and ingest the results into the store.
    Pull {
        /// arXiv category (cs.AI) or free-text topic.
        #[arg(short, long)]
        domain: String,

        /// Number of papers to pull.
        #[arg(short, long, default_value = "10")]
        num: usize,
    },

    /// Acquire metadata and introductions for many references at once.
    Acquire {
        /// Paper references.
        #[arg(required = true)]
        references: Vec<String>,

        /// Skip introduction extraction.
        #[arg(long)]
        no_intro: bool,

        /// Print the per-candidate report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Inspect or edit the paper store.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Search subcommands.
#[derive(Subcommand)]
pub(crate) enum SearchAction {
    /// Most recent submissions in a domain.
    Recent {
        #[arg(short, long)]
        domain: String,

        #[arg(short, long, default_value = "10")]
        max: usize,

        /// Ingest the results into the store.
        #[arg(long)]
        ingest: bool,
    },
    /// Keyword search scoped to a domain.
    Related {
        #[arg(short, long)]
        query: String,

        #[arg(short, long)]
        domain: String,

        #[arg(short, long, default_value = "10")]
        num: usize,

        /// Ingest the results into the store.
        #[arg(long)]
        ingest: bool,
    },
}

/// Store subcommands.
#[derive(Subcommand)]
pub(crate) enum StoreAction {
    /// List every stored paper.
    List,
    /// Print one paper as JSON.
    Get { pk: String },
    /// Delete one paper.
    Delete { pk: String },
    /// Papers matching every `field=value` condition (fields: pk, title, abstract).
    Query { conditions: Vec<String> },
    /// Count papers, optionally filtered by `field=value` conditions.
    Count { conditions: Vec<String> },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "papertrail=info",
        1 => "papertrail=debug",
        _ => "papertrail=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = load_config()?;
    let store_path = match cli.store {
        Some(path) => path,
        None => expand_home(&config.defaults.store_path)?,
    };

    match cli.command {
        Command::Search { action } => match action {
            SearchAction::Recent { domain, max, ingest } => {
                let acquirer = Acquirer::from_config(&config)?;
                let results = acquirer.search().search_recent(max, &domain).await?;
                cmd_search_output(&results, ingest.then_some(store_path.as_path()))
            }
            SearchAction::Related {
                query,
                domain,
                num,
                ingest,
            } => {
                let acquirer = Acquirer::from_config(&config)?;
                let results = acquirer.search().search_related(num, &query, &domain).await?;
                cmd_search_output(&results, ingest.then_some(store_path.as_path()))
            }
        },
        Command::Paper { identifier } => cmd_paper(&config, &identifier).await,
        Command::References {
            identifier,
            acquire,
        } => cmd_references(&config, &identifier, acquire, &store_path).await,
        Command::Sections { url } => cmd_sections(&config, &url).await,
        Command::Intro { reference } => cmd_intro(&config, &reference).await,
        Command::Pull { domain, num } => cmd_pull(&config, &domain, num, &store_path).await,
        Command::Acquire {
            references,
            no_intro,
            json,
        } => cmd_acquire(&config, references, no_intro, json, &store_path).await,
        Command::Store { action } => cmd_store(action, &store_path),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_search_output(results: &[SearchResult], ingest_into: Option<&Path>) -> Result<()> {
    for result in results {
        print_result(result);
    }
    println!();
    println!("  {} result(s)", results.len());

    if let Some(path) = ingest_into {
        let mut store = PaperProfileStore::open(path)?;
        let summary = store.ingest(group_by_published_date(results));
        store.save(path)?;
        println!(
            "  Ingested into {}: {} added, {} merged",
            path.display(),
            summary.added,
            summary.merged
        );
    }
    Ok(())
}

fn print_result(result: &SearchResult) {
    println!(
        "  {:<12} {}  [{}] {}",
        result.identifier,
        result.published.format("%Y-%m-%d"),
        result.category,
        result.title
    );
}

async fn cmd_paper(config: &AppConfig, identifier: &str) -> Result<()> {
    let acquirer = Acquirer::from_config(config)?;
    let result = acquirer.search().fetch_by_identifier(identifier).await?;

    println!();
    println!("  {}", result.title);
    println!("  ID:        {}", result.identifier);
    println!("  URL:       {}", result.url);
    println!("  Category:  {}", result.category);
    println!("  Published: {}", result.published.to_rfc3339());
    if !result.authors.is_empty() {
        println!("  Authors:   {}", result.authors.join(", "));
    }
    if let Some(pdf) = &result.pdf_url {
        println!("  PDF:       {pdf}");
    }
    println!();
    println!("{}", result.summary);
    Ok(())
}

async fn cmd_references(
    config: &AppConfig,
    identifier: &str,
    acquire: bool,
    store_path: &Path,
) -> Result<()> {
    let acquirer = Acquirer::from_config(config)?;

    if acquire {
        let store = shared(PaperProfileStore::open(store_path)?);
        let reporter = CliProgress::new();
        let report = acquirer
            .acquire_references(identifier, &store, &reporter)
            .await?;
        print_report(&report);
        return save_shared(&store, store_path).await;
    }

    let references = acquirer.citations().get_references(identifier).await?;
    for (i, r) in references.iter().enumerate() {
        println!(
            "  {:>3}. {:<24} {}",
            i + 1,
            r.identifier.as_deref().unwrap_or("-"),
            r.title.as_deref().unwrap_or("(untitled)")
        );
    }
    println!();
    println!("  {} reference(s)", references.len());
    Ok(())
}

async fn cmd_sections(config: &AppConfig, url: &str) -> Result<()> {
    let url = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;
    let acquirer = Acquirer::from_config(config)?;

    let Some(sections) = acquirer.resolver().extract_sections(&url).await else {
        println!("  No recognizable sections found.");
        return Ok(());
    };

    for section in sections.iter() {
        println!("  {:<48} {:>7} chars", section.heading, section.body.chars().count());
    }
    Ok(())
}

async fn cmd_intro(config: &AppConfig, reference: &str) -> Result<()> {
    let acquirer = Acquirer::from_config(config)?;
    let outcome = acquirer.resolver().extract_introduction_traced(reference).await;

    for attempt in &outcome.attempts {
        let url = attempt.url.as_ref().map(Url::as_str).unwrap_or("-");
        match &attempt.error {
            Some(error) => eprintln!("  {} ({url}): {error}", attempt.strategy),
            None => eprintln!("  {} ({url}): no introduction found", attempt.strategy),
        }
    }

    match (outcome.text, outcome.strategy) {
        (Some(text), Some(strategy)) => {
            info!(strategy, "introduction extracted");
            eprintln!("  Extracted via {strategy}");
            println!("{text}");
            Ok(())
        }
        _ => Err(eyre!("no introduction found for '{reference}'")),
    }
}

async fn cmd_pull(config: &AppConfig, domain: &str, num: usize, store_path: &Path) -> Result<()> {
    let acquirer = Acquirer::from_config(config)?;
    let store = shared(PaperProfileStore::open(store_path)?);

    let summary = acquirer.pull_papers(num, domain, &store).await?;
    save_shared(&store, store_path).await?;

    println!();
    println!("  Pulled papers for {domain}");
    println!("  Added:   {}", summary.added);
    println!("  Merged:  {}", summary.merged);
    println!("  Store:   {} ({} papers)", store_path.display(), store.read().await.len());
    println!();
    Ok(())
}

async fn cmd_acquire(
    config: &AppConfig,
    references: Vec<String>,
    no_intro: bool,
    json: bool,
    store_path: &Path,
) -> Result<()> {
    let mut config = config.clone();
    if no_intro {
        config.defaults.extract_introductions = false;
    }

    let acquirer = Acquirer::from_config(&config)?;
    let store = shared(PaperProfileStore::open(store_path)?);

    info!(count = references.len(), "acquiring papers");
    let reporter = CliProgress::new();
    let report = acquirer.acquire_batch(&references, &store, &reporter).await;
    save_shared(&store, store_path).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.candidates)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    println!();
    for candidate in &report.candidates {
        let marker = if candidate.status.is_success() { "✓" } else { "✗" };
        println!("  {marker} {:<40} {}", candidate.reference, candidate.status);
    }
    println!();
    println!(
        "  {} succeeded, {} retrieval failed, {} extraction failed ({:.1}s)",
        report.succeeded(),
        report.retrieval_failed(),
        report.extraction_failed(),
        report.elapsed.as_secs_f64()
    );
    println!();
}

async fn save_shared(store: &SharedStore, path: &Path) -> Result<()> {
    store.read().await.save(path)?;
    Ok(())
}

fn cmd_store(action: StoreAction, path: &Path) -> Result<()> {
    let mut store = PaperProfileStore::open(path)?;

    match action {
        StoreAction::List => {
            for profile in store.iter() {
                println!(
                    "  {:<38} {}",
                    profile.pk,
                    profile.title.as_deref().unwrap_or("(untitled)")
                );
            }
            println!();
            println!("  {} paper(s)", store.len());
        }
        StoreAction::Get { pk } => {
            let profile = store
                .get(&pk)
                .ok_or_else(|| eyre!("no paper with id '{pk}'"))?;
            println!("{}", serde_json::to_string_pretty(profile)?);
        }
        StoreAction::Delete { pk } => {
            if !store.delete(&pk) {
                return Err(eyre!("no paper with id '{pk}'"));
            }
            store.save(path)?;
            println!("  Deleted {pk}");
        }
        StoreAction::Query { conditions } => {
            let query = PaperQuery::parse(&conditions)?;
            let matches = store.query(&query);
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
        StoreAction::Count { conditions } => {
            let query = PaperQuery::parse(&conditions)?;
            println!("{}", store.count(&query));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl BatchProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn candidate_finished(&self, reference: &str, status: &CandidateStatus, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
        self.bar.set_message(format!("{reference}: {status}"));
    }

    fn done(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

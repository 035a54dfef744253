//! PaperTrail CLI: acquire scholarly-paper metadata and content into a local profile store.
//!
//! Searches arXiv, follows citation graphs, extracts introductions from HTML
//! renderings or PDFs, and maintains a JSON paper profile store.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

//! incident-summarizer: keeps AI-generated incident summaries up to date.
//!
//! Fetches incidents from the tracking service, decides which summaries are
//! stale, and regenerates them through an LLM backend.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Command handlers surface config errors; here only the level matters.
    let level = summarizer_shared::resolve_config()
        .map(|config| config.logging.level)
        .unwrap_or_else(|_| "info".to_string());
    commands::init_tracing(&cli, &level);

    commands::run(cli).await
}

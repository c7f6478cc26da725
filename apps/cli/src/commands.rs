//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use summarizer_core::{
    BatchReport, OpenAiChatBackend, Outcome, SummaryPipeline, SummaryProgress, WorkerOptions,
    run_worker,
};
use summarizer_shared::{AppConfig, init_config, resolve_config};
use summarizer_tracker::{TrackerClient, build_http_client};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Generate AI summaries for incidents in the tracking service.
#[derive(Parser)]
#[command(
    name = "incident-summarizer",
    version,
    about = "Generate AI summaries for tracked incidents and keep them up to date.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Tracking API base URL (overrides config and WEBRCA_V1_API_BASE_URL).
    #[arg(long, global = true)]
    pub api_base_url: Option<String>,

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
    /// Generate a summary for a single incident and print it.
    Generate {
        /// Incident public ID (example: ITN-2025-00096).
        #[arg(long)]
        id: String,

        /// Prompt template file.
        #[arg(long)]
        prompt: Option<PathBuf>,
    },

    /// Summarize every incident with a stale AI summary and write it back.
    Worker {
        /// Only consider incidents changed within the last N days.
        #[arg(long = "since", value_name = "DAYS")]
        max_days_since_update: Option<u32>,

        /// Maximum summaries generated concurrently.
        #[arg(long)]
        max_workers: Option<usize>,

        /// Prompt template file.
        #[arg(long)]
        prompt: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
///
/// `RUST_LOG` wins; otherwise `-v` flags, then `default_level`.
pub(crate) fn init_tracing(cli: &Cli, default_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => default_level,
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level)))
        .unwrap_or_else(|_| EnvFilter::new(default_directive("info")));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

/// Library crates log under `summarizer_*`, the binary under
/// `incident_summarizer`.
fn default_directive(level: &str) -> String {
    format!("warn,summarizer={level},incident_summarizer={level}")
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let api_base_url = cli.api_base_url;
    match cli.command {
        Command::Generate { id, prompt } => {
            let config = load_effective_config(api_base_url, None, prompt)?;
            cmd_generate(&config, &id).await
        }
        Command::Worker {
            max_days_since_update,
            max_workers,
            prompt,
        } => {
            let config = load_effective_config(api_base_url, max_workers, prompt)?;
            cmd_worker(&config, max_days_since_update).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(api_base_url).await,
        },
    }
}

/// Config file and env, with CLI flags on top, validated.
fn load_effective_config(
    api_base_url: Option<String>,
    max_workers: Option<usize>,
    prompt: Option<PathBuf>,
) -> Result<AppConfig> {
    let mut config = resolve_config()?;
    apply_cli_overrides(&mut config, api_base_url, max_workers, prompt);
    config.validate()?;
    Ok(config)
}

fn apply_cli_overrides(
    config: &mut AppConfig,
    api_base_url: Option<String>,
    max_workers: Option<usize>,
    prompt: Option<PathBuf>,
) {
    if let Some(url) = api_base_url {
        config.tracker.api_base_url = url;
    }
    if let Some(workers) = max_workers {
        config.worker.max_workers = workers;
    }
    if let Some(path) = prompt {
        config.worker.prompt_path = path.to_string_lossy().into_owned();
    }
}

fn build_pipeline(config: &AppConfig) -> Result<SummaryPipeline> {
    let client = TrackerClient::from_config(config)?;

    let llm_http = build_http_client(Duration::from_secs(config.worker.summary_timeout_secs))?;
    let backend = OpenAiChatBackend::from_config(llm_http, &config.llm)?;

    Ok(SummaryPipeline::from_config(
        client,
        Arc::new(backend),
        &config.worker,
    )?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_generate(config: &AppConfig, id: &str) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let incident = pipeline.client().find_incident(id).await?;

    info!(public_id = %incident.incident_id, "generating summary");

    let progress = CliProgress::new();
    let summary = pipeline.summarize(&incident, &progress).await;
    progress.finish();
    let summary = summary?;

    println!();
    println!("{}", rule("AI-generated Summary"));
    println!();
    println!("{summary}");

    Ok(())
}

async fn cmd_worker(config: &AppConfig, max_days_since_update: Option<u32>) -> Result<()> {
    let pipeline = build_pipeline(config)?;

    let options = WorkerOptions {
        statuses: config.tracker.statuses()?,
        max_days_since_update,
        max_workers: config.worker.max_workers,
    };

    let report = run_worker(&pipeline, &options, Utc::now()).await?;
    print_report(&report);

    if !report.is_success() {
        return Err(eyre!(
            "{} of {} incident summaries failed",
            report.failed,
            report.total
        ));
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(api_base_url: Option<String>) -> Result<()> {
    let mut config = resolve_config()?;
    apply_cli_overrides(&mut config, api_base_url, None, None);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

const RULE_WIDTH: usize = 72;

/// A horizontal rule with a centered title.
fn rule(title: &str) -> String {
    let label = format!(" {title} ");
    let remaining = RULE_WIDTH.saturating_sub(label.chars().count());
    let left = remaining / 2;
    format!("{}{label}{}", "─".repeat(left), "─".repeat(remaining - left))
}

fn print_report(report: &BatchReport) {
    println!();
    println!("  Worker finished");
    println!("  Total:     {}", report.total);
    println!("  Succeeded: {}", report.succeeded);
    println!("  Failed:    {}", report.failed);

    for result in report.outcomes.values() {
        if let Outcome::Failed(reason) = &result.outcome {
            println!("    {}: {reason}", result.public_id);
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner showing how much of the summary has streamed in.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.magenta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.set_message("Waiting on summary... (bytes received: 0)");
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl SummaryProgress for CliProgress {
    fn received(&self, bytes: usize) {
        self.spinner
            .set_message(format!("Waiting on summary... (bytes received: {bytes})"));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Funding scout CLI
//!
//! Pulls recent funding announcements from the newsletter, looks the funded
//! companies up on their job boards and saves entry-level openings.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use search_fundings::config::{Config, Renderer};
use search_fundings::context::RunContext;
use search_fundings::pipeline::{Pipeline, RunOptions};
use search_fundings::storage::{self, OutputFormat, DEFAULT_OUTPUT_DIR};
use search_fundings::types::{CompanyStatus, RunOutput};

#[derive(Parser)]
#[command(name = "search_fundings")]
#[command(about = "Find entry-level jobs at recently funded startups")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(long, env = "SEARCH_FUNDINGS_CONFIG")]
    config: Option<PathBuf>,

    /// Lookback window in days
    #[arg(long)]
    days: Option<u32>,

    /// Maximum number of issues to process (0 = unlimited)
    #[arg(long)]
    max_articles: Option<usize>,

    /// Only extract funding records, skip the job search
    #[arg(long)]
    skip_jobs: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    output_format: OutputFormat,

    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Page renderer: plain HTTP or a WebDriver-controlled browser
    #[arg(long, value_parser = parse_renderer)]
    renderer: Option<Renderer>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_renderer(value: &str) -> Result<Renderer, String> {
    match value.to_lowercase().as_str() {
        "http" => Ok(Renderer::Http),
        "webdriver" => Ok(Renderer::WebDriver),
        other => Err(format!("unknown renderer '{}', expected http or webdriver", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("search_fundings=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // 1. Configuration, with command-line overrides
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(days) = cli.days {
        config.discovery.lookback_days = days;
    }
    if let Some(max) = cli.max_articles {
        config.discovery.max_documents = max;
    }
    if let Some(renderer) = cli.renderer {
        config.fetch.renderer = renderer;
    }

    let pipeline = Pipeline::from_config(config).context("Failed to set up pipeline")?;

    // 2. Ctrl-C cancels the run; completed work is still saved
    let ctx = Arc::new(RunContext::new());
    let signal_ctx = Arc::clone(&ctx);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing with partial results");
            signal_ctx.cancel();
        }
    });

    println!(
        "Searching issues from the last {} days (max {})",
        pipeline.config().discovery.lookback_days,
        match pipeline.config().discovery.max_documents {
            0 => "unlimited".to_string(),
            n => n.to_string(),
        }
    );

    // 3. Run and save
    let output = pipeline
        .run(&ctx, RunOptions { skip_jobs: cli.skip_jobs })
        .await
        .context("Run failed")?;

    let today = chrono::Local::now().date_naive();
    let saved = storage::save_output(&cli.output_dir, &output, cli.output_format, today)?;

    print_summary(&output);
    println!("\nSaved to {}", cli.output_dir.display());
    println!("  {}", saved.fundings.display());
    println!("  {}", saved.report.display());

    Ok(())
}

fn print_summary(output: &RunOutput) {
    let report = &output.report;
    let counters = &report.counters;

    println!("\n=== Run {} ===", report.status);
    println!(
        "Documents: {} discovered, {} fetched, {} failed",
        counters.documents_discovered, counters.documents_fetched, counters.fetch_failures
    );
    println!(
        "Funding paragraphs: {} seen, {} parsed, {} name only, {} unparseable",
        counters.sections_seen, counters.records_parsed, counters.records_fallback, counters.parse_failures
    );

    for record in output.funding_records.iter().take(10) {
        let amount = record.amount.as_ref().map(|a| a.to_string()).unwrap_or_else(|| "?".to_string());
        let round = record.round.as_deref().unwrap_or("?");
        println!("  - {} ({}, {})", record.company_name, amount, round);
    }

    if !report.companies.is_empty() {
        let found = report
            .companies
            .iter()
            .filter(|c| c.status() == CompanyStatus::Found)
            .count();
        println!(
            "Companies: {} searched, {} with a job board, {} queries failed",
            counters.companies_searched,
            found,
            counters.ats_failures
        );
        println!(
            "Postings: {} seen, {} included",
            counters.postings_seen, counters.postings_included
        );
        for filtered in &output.postings {
            println!(
                "  - {} at {} [{}] ({})",
                filtered.posting.title,
                filtered.posting.company_name,
                filtered.posting.location.as_deref().unwrap_or("?"),
                filtered.match_reason
            );
        }
    }

    if !report.not_found.is_empty() {
        println!("Not found on any platform: {}", report.not_found.join(", "));
    }
    if !report.canceled.is_empty() {
        println!("Search canceled: {}", report.canceled.join(", "));
    }

    if report.errors.total() > 0 {
        println!("\n⚠️  {} recoverable errors:", report.errors.total());
        for (kind, tally) in &report.errors.by_kind {
            println!("  {:?}: {}", kind, tally.count);
            for sample in &tally.samples {
                println!("    - {}", sample);
            }
        }
    }
}

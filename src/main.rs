//! CrawlCore CLI
//!
//! Replays locally stored pages through the crawl core: each `URL=FILE`
//! argument is treated as a successful fetch of `URL` whose body is the
//! contents of `FILE`. Useful for inspecting extraction, trap filtering and
//! the final report without a network.

use anyhow::{Context, Result};
use clap::Parser;
use crawlcore::{
    config::{Config, LogFormat, LoggingConfig},
    scraping::{fetcher::FetchResult, CrawlState, PageOutcome, PageProcessor, PolitenessLimiter},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crawlcore")]
#[command(about = "Polite, trap-avoiding page processing for web crawls")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "crawlcore.toml")]
    config: PathBuf,

    /// Report file path (overrides the config)
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Pages to process, as URL=FILE
    #[arg(required = true, value_parser = parse_page_arg)]
    pages: Vec<(String, PathBuf)>,
}

fn parse_page_arg(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((url, path)) if !url.is_empty() && !path.is_empty() => {
            Ok((url.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected URL=FILE, got '{}'", arg)),
    }
}

fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let level = logging.level.raised_by(verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let result = match logging.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(report) = cli.report {
        config.crawl.report_path = Some(report);
    }

    init_logging(&config.logging, cli.verbose)?;

    let state = Arc::new(CrawlState::new(&config.crawl));
    let processor = Arc::new(PageProcessor::new(Arc::clone(&state), &config.crawl));
    let limiter = PolitenessLimiter::new(config.crawl.min_politeness_delay());

    info!(pages = cli.pages.len(), delay = ?limiter.min_delay(), "Processing pages");

    for (url, path) in cli.pages {
        if !state.is_valid(&url) {
            warn!(url = %url, "Skipping URL rejected by the crawl filters");
            continue;
        }
        limiter.wait_before_request(&url).await;

        let body = std::fs::read(&path)
            .with_context(|| format!("Failed to read page body '{}'", path.display()))?;
        let fetch = FetchResult::ok(url.clone(), body);

        let processor = Arc::clone(&processor);
        let outcome = tokio::task::spawn_blocking(move || processor.process(&fetch)).await?;

        match &outcome {
            PageOutcome::Processed { links, word_count } => {
                info!(url = %url, words = word_count, links = links.len(), "Processed page");
            }
            PageOutcome::Duplicate { .. } => info!(url = %url, "Duplicate content"),
            PageOutcome::Skipped(reason) => warn!(url = %url, ?reason, "Skipped page"),
        }
        for link in outcome.into_links() {
            println!("{}", link);
        }
    }

    let report = state.snapshot();
    if let Some(path) = &config.crawl.report_path {
        report.write_to(path)?;
        info!(path = %path.display(), "Report written");
    }
    eprintln!("{}", report);

    Ok(())
}

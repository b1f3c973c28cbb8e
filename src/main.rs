//! # Ticker News
//!
//! Finds recent news articles for a list of stock tickers, works out when
//! each one was published, and prints a feed ordered newest first.
//!
//! ## Features
//!
//! - Discovers article URLs per ticker through Google News RSS, or reads a
//!   fixed `SYMBOL URL` list
//! - Fetches articles concurrently with a per-request timeout and one retry
//!   on timeout
//! - Extracts publication dates from structured metadata, page markup, or
//!   the URL path, in that order of trust
//! - Normalizes every date to one display timezone and rejects implausible
//!   values
//! - Keeps undated articles, listed after the dated ones
//!
//! ## Usage
//!
//! ```sh
//! ticker_news -s AAPL -s MSFT -j ./json -m ./markdown
//! ```
//!
//! ## Architecture
//!
//! 1. **Discovery**: ticker symbols become [`ArticleCandidate`](models::ArticleCandidate)s
//! 2. **Fetching**: each candidate's HTML is downloaded
//! 3. **Extraction**: a strategy chain finds a raw date string
//! 4. **Normalization**: the raw date becomes a timezone-aware instant
//! 5. **Ranking**: dated articles newest first, undated last
//! 6. **Output**: JSON file, Markdown table, or stdout

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod discovery;
mod extract;
mod fetcher;
mod grammar;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod rank;
mod utils;

use cli::Cli;
use config::{PipelineConfig, load_config};
use discovery::GoogleNewsDiscovery;
use fetcher::{HttpFetcher, RetryOnTimeout};
use models::ArticleCandidate;
use normalize::Normalizer;
use outputs::{json, markdown};
use pipeline::Pipeline;
use utils::ensure_writable_dir;

/// Pause before the single retry of a timed-out fetch.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ticker_news starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = load_config(args.config.as_deref()).await?;
    config.apply_cli(&args);
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e);
    }

    // Fail early rather than after every article has been fetched.
    for dir in [&args.json_output_dir, &args.markdown_output_dir].into_iter().flatten() {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Output directory is not writable (fix perms or choose a different path)");
            return Err(e);
        }
    }

    let candidates = collect_candidates(&args, &config).await?;
    info!(count = candidates.len(), "Candidates to resolve");

    let fetcher = RetryOnTimeout::new(HttpFetcher::from_config(&config)?, RETRY_BASE_DELAY);
    let normalizer = Normalizer::from_config(&config)?;
    info!(
        source_tz = %normalizer.source_tz(),
        display_tz = %normalizer.display_tz(),
        max_concurrent = config.concurrency(),
        "Pipeline configured"
    );
    let pipeline = Pipeline::new(fetcher, normalizer, config.concurrency());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling run");
            on_ctrl_c.cancel();
        }
    });

    let feed = pipeline.process(candidates, &cancel).await?;

    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = json::write_feed(&feed, pipeline.normalizer().display_tz(), dir).await {
            error!(error = %e, "Failed to write JSON feed");
        }
    }

    let md = markdown::feed_to_markdown(&feed);
    match &args.markdown_output_dir {
        Some(dir) => {
            let path = format!(
                "{}/news_{}.md",
                dir.trim_end_matches('/'),
                Local::now().format("%Y-%m-%d_%H%M%S")
            );
            match tokio::fs::write(&path, md).await {
                Ok(()) => info!(%path, "Wrote Markdown feed"),
                Err(e) => error!(%path, error = %e, "Failed writing Markdown"),
            }
        }
        None => println!("{md}"),
    }

    info!(
        articles = feed.len(),
        dated = feed.dated_count(),
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "ticker_news finished"
    );
    Ok(())
}

/// Candidates from `--candidates`, or from searching each ticker.
async fn collect_candidates(
    args: &Cli,
    config: &PipelineConfig,
) -> Result<Vec<ArticleCandidate>, Box<dyn Error>> {
    if let Some(path) = &args.candidates {
        let text = tokio::fs::read_to_string(path).await?;
        let candidates = discovery::parse_candidate_lines(&text);
        info!(%path, count = candidates.len(), "Loaded candidate list");
        return Ok(candidates);
    }

    let symbols = if args.symbols.is_empty() {
        discovery::load_symbols(&args.symbols_file).await?
    } else {
        args.symbols.clone()
    };
    if symbols.is_empty() {
        warn!("No ticker symbols given; nothing to search");
    }

    let discovery = GoogleNewsDiscovery::from_config(config)?;
    Ok(discovery.discover(&symbols, Local::now().date_naive()).await)
}

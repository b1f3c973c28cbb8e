//! Command-line interface definitions for Ticker News.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Pipeline tuning flags can also be provided via environment variables and
//! take precedence over the YAML config file.

use clap::Parser;

/// Command-line arguments for the Ticker News application.
///
/// # Examples
///
/// ```sh
/// # Search news for the tickers listed in stocks.txt
/// ticker_news
///
/// # Pick tickers explicitly and write JSON and Markdown output
/// ticker_news -s AAPL -s MSFT -j ./json -m ./markdown
///
/// # Skip search discovery and resolve a fixed list of URLs
/// ticker_news --candidates ./candidates.txt
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Ticker symbol to fetch news for (repeatable; overrides --symbols-file)
    #[arg(short = 's', long = "symbol")]
    pub symbols: Vec<String>,

    /// File with one ticker symbol per line
    #[arg(long, default_value = "stocks.txt")]
    pub symbols_file: String,

    /// File of `SYMBOL URL` lines to resolve instead of searching
    #[arg(long)]
    pub candidates: Option<String>,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output directory for the JSON feed file
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Output directory for the Markdown feed file (stdout when omitted)
    #[arg(short, long)]
    pub markdown_output_dir: Option<String>,

    /// Per-request fetch timeout in seconds
    #[arg(long, env = "TICKER_NEWS_TIMEOUT_SECS")]
    pub timeout_secs: Option<f64>,

    /// Maximum simultaneous article fetches
    #[arg(long, env = "TICKER_NEWS_MAX_CONCURRENT")]
    pub max_concurrent: Option<usize>,

    /// IANA timezone assumed for dates without an offset
    #[arg(long, env = "TICKER_NEWS_SOURCE_TZ")]
    pub source_tz: Option<String>,

    /// IANA timezone used for displayed timestamps
    #[arg(long, env = "TICKER_NEWS_DISPLAY_TZ")]
    pub display_tz: Option<String>,
}

//! # newsreel CLI (`reel`)
//!
//! Search videos, news, and listed companies from the terminal and have the
//! results summarized.
//!
//! ## Usage
//!
//! ```bash
//! reel --config ./config/reel.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `reel search <keywords>…` | Search and list filtered results |
//! | `reel summarize <keywords>…` | Search, then summarize one result |
//! | `reel brief <keywords>…` | Videos + articles analysed together |
//! | `reel stock <company>` | Look up listed symbols with last close |
//! | `reel financials <symbol>` | Financial statement analysis |
//! | `reel ticker` | Index ticker (`--once` for a single line) |
//! | `reel serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Most-viewed videos from the last week; the kept ones are then re-sorted
//! # by [pipeline].resort (set resort = "none" to keep view order)
//! reel search 반도체 수출 --period week --order views
//!
//! # Keywords from a [domains] preset
//! reel search --domain economy --source news
//!
//! # Insight (tags + importance) for the first news article
//! reel summarize ev batteries --source news --mode insight
//!
//! # Save a briefing as JSON
//! reel brief ai regulation --output out/brief.json
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use newsreel::commands::{self, GenerateMode};
use newsreel::config;
use newsreel::logging;
use newsreel::models::SourceTag;
use newsreel::period::PeriodFilter;
use newsreel::server;
use newsreel::session::SearchForm;
use newsreel::traits::{DurationBucket, Providers, VideoOrder};

/// newsreel: keyword search over videos, news, and markets with AI summaries.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/reel.example.toml` for a full example. Built-in
/// defaults are used when the file does not exist.
#[derive(Parser)]
#[command(
    name = "reel",
    about = "newsreel: keyword search over videos, news, and markets with AI summaries",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/reel.toml")]
    config: PathBuf,

    /// More log output on stderr (`-v` info, `-vv` debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// The shared search form.
#[derive(Args, Clone)]
struct SearchArgs {
    /// Up to three keywords; extras are ignored.
    keywords: Vec<String>,

    /// Use a `[domains]` preset instead of keywords.
    #[arg(long)]
    domain: Option<String>,

    /// `video`, `news`, `financial`, or `mixed`.
    #[arg(long, default_value = "video", value_parser = parse_source)]
    source: SourceTag,

    /// `relevance`, `views`, or `date`.
    #[arg(long, default_value = "relevance", value_parser = parse_order)]
    order: VideoOrder,

    /// `any`, `short`, `medium`, or `long` (videos only).
    #[arg(long, default_value = "any", value_parser = parse_duration)]
    duration: DurationBucket,

    /// `hour`, `day`, `week`, `month`, `3months`, `year`, or `all`.
    #[arg(long, default_value = "all", value_parser = parse_period)]
    period: PeriodFilter,
}

impl SearchArgs {
    fn into_form(self) -> SearchForm {
        SearchForm {
            keywords: self.keywords,
            domain: self.domain,
            source: self.source,
            order: self.order,
            duration: self.duration,
            period: self.period,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search and list filtered, re-sorted results.
    Search {
        #[command(flatten)]
        search: SearchArgs,

        /// Print the result set as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search, then summarize (or recommend, or tag) one result.
    Summarize {
        #[command(flatten)]
        search: SearchArgs,

        /// Which result to use, 1-based.
        #[arg(long, default_value_t = 1)]
        item: usize,

        /// `summary`, `recommend`, or `insight`.
        #[arg(long, default_value = "summary", value_parser = parse_mode)]
        mode: GenerateMode,

        /// Also write the summary here (`.json` for JSON).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Search videos and news together and analyse them as one topic.
    Brief {
        #[command(flatten)]
        search: SearchArgs,

        /// Topic named in the analysis; defaults to the keywords.
        #[arg(long)]
        topic: Option<String>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Look up listed companies by name.
    Stock {
        company: String,

        #[arg(long)]
        json: bool,
    },

    /// Analyse the latest financial statements of a symbol.
    Financials {
        symbol: String,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show index prices from `[ticker].symbols`.
    Ticker {
        /// Print one line and exit.
        #[arg(long)]
        once: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn parse_source(s: &str) -> Result<SourceTag, String> {
    SourceTag::parse(s).ok_or_else(|| format!("unknown source '{}'", s))
}

fn parse_order(s: &str) -> Result<VideoOrder, String> {
    VideoOrder::parse(s).ok_or_else(|| format!("unknown order '{}'", s))
}

fn parse_duration(s: &str) -> Result<DurationBucket, String> {
    DurationBucket::parse(s).ok_or_else(|| format!("unknown duration '{}'", s))
}

fn parse_period(s: &str) -> Result<PeriodFilter, String> {
    PeriodFilter::parse(s).ok_or_else(|| format!("unknown period '{}'", s))
}

fn parse_mode(s: &str) -> Result<GenerateMode, String> {
    GenerateMode::parse(s).ok_or_else(|| format!("unknown mode '{}'", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(logging::level_for(cli.verbose));

    let cfg = config::load_or_default(&cli.config)?;
    let providers = Providers::from_config(&cfg)?;

    match cli.command {
        Commands::Search { search, json } => {
            commands::run_search(cfg, providers, &search.into_form(), json).await?;
        }
        Commands::Summarize {
            search,
            item,
            mode,
            output,
        } => {
            commands::run_summarize(cfg, providers, &search.into_form(), item, mode, output.as_deref())
                .await?;
        }
        Commands::Brief {
            search,
            topic,
            output,
        } => {
            commands::run_brief(cfg, providers, &search.into_form(), topic.as_deref(), output.as_deref())
                .await?;
        }
        Commands::Stock { company, json } => {
            commands::run_stock(cfg, providers, &company, json).await?;
        }
        Commands::Financials { symbol, output } => {
            commands::run_financials(cfg, providers, &symbol, output.as_deref()).await?;
        }
        Commands::Ticker { once } => {
            commands::run_ticker(cfg, providers, once).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg, providers).await?;
        }
    }

    Ok(())
}

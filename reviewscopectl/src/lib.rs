use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;

use reviewscope_core::reviews::{ProductUrl, RatingLimits};
use reviewscope_core::{load_scraper_config, ScraperConfig};

pub mod commands;

use commands::estimate::{EstimateArgs, EstimateReport};
use commands::scrape::ScrapeArgs;
use commands::validate::{ValidateArgs, ValidateReport};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] reviewscope_core::ConfigError),
    #[error("browser error: {0}")]
    Browser(#[from] reviewscope_core::BrowserError),
    #[error("invalid request: {0}")]
    Request(#[from] reviewscope_core::RequestError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("scrape failed: {0}")]
    ScrapeFailed(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Marketplace review acquisition", long_about = None)]
pub struct Cli {
    /// Path to scraper.toml
    #[arg(long, default_value = "configs/scraper.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(long, global = true)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect reviews from a product page
    Scrape(ScrapeArgs),
    /// Check a product address without opening a browser
    Validate(ValidateArgs),
    /// Rough duration for a set of page limits
    Estimate(EstimateArgs),
    /// Summarize the loaded configuration
    Config,
}

pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Scrape(args) => {
            let config = load_scraper_config(&cli.config)?;
            let report = commands::scrape::execute(config, args, cli.format).await?;
            render(&report, cli.format)?;
        }
        Commands::Validate(args) => {
            let report = ValidateReport::build(args, Local::now().naive_local())?;
            render(&report, cli.format)?;
        }
        Commands::Estimate(args) => {
            let report = EstimateReport::build(&parse_limits(&args.limits)?);
            render(&report, cli.format)?;
        }
        Commands::Config => {
            let config = load_scraper_config(&cli.config)?;
            render(&ConfigSummary::from_config(&cli.config, &config), cli.format)?;
        }
    }
    Ok(())
}

pub fn parse_limits(pairs: &[(u8, u32)]) -> Result<RatingLimits> {
    Ok(RatingLimits::from_pairs(
        pairs.iter().map(|(rating, pages)| (*rating, Some(*pages))),
    )?)
}

/// `--limit` value parser (`RATING=PAGES`).
pub fn parse_limit_arg(value: &str) -> std::result::Result<(u8, u32), String> {
    RatingLimits::parse_entry(value).map_err(|err| err.to_string())
}

pub(crate) fn parse_url(value: &str) -> Result<ProductUrl> {
    Ok(ProductUrl::parse(value)?)
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

pub(crate) trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
struct ConfigSummary {
    path: PathBuf,
    headless: bool,
    profile_dir: String,
    user_agents: usize,
    viewport: String,
    navigation_timeout_s: u64,
    filter_refresh_timeout_s: u64,
    page_advance_timeout_s: u64,
    review_entry_selector: String,
}

impl ConfigSummary {
    fn from_config(path: &std::path::Path, config: &ScraperConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            headless: config.chromium.headless,
            profile_dir: config.chromium.profile_dir.clone(),
            user_agents: config.user_agents.pool.len(),
            viewport: format!("{}x{}", config.viewport.width, config.viewport.height),
            navigation_timeout_s: config.timeouts.navigation_seconds,
            filter_refresh_timeout_s: config.timeouts.filter_refresh_seconds,
            page_advance_timeout_s: config.timeouts.page_advance_seconds,
            review_entry_selector: config.selectors.review_entry.clone(),
        }
    }
}

impl DisplayFallback for ConfigSummary {
    fn display(&self) -> String {
        format!(
            "config: {}\nheadless: {}\nprofiles: {}\nuser agents: {}\nviewport: {}\ntimeouts: navigation {}s, filter {}s, page {}s\nreview entries: {}",
            self.path.display(),
            self.headless,
            self.profile_dir,
            self.user_agents,
            self.viewport,
            self.navigation_timeout_s,
            self.filter_refresh_timeout_s,
            self.page_advance_timeout_s,
            self.review_entry_selector
        )
    }
}

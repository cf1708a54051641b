pub mod browser;
pub mod config;
pub mod error;
pub mod reviews;

pub use browser::{BrowserError, BrowserResult, ReviewSession, SessionProvider};
pub use config::{load_scraper_config, ScraperConfig};
pub use error::{ConfigError, Result};
pub use reviews::{
    CancellationToken, ProductUrl, ProgressEvent, RatingLimits, RequestError, ReviewPipeline,
    ReviewRecord, ScrapeHandle, ScrapeRequest, ScrapeResult, ScrapeRunner, ScrollSpeed,
};

mod error;
mod extractor;
mod model;
mod navigator;
mod paginator;
mod pipeline;
mod progress;
mod runner;
mod url;

pub use error::{RequestError, RequestResult};
pub use extractor::{normalize_text, parse_timestamp, PageExtraction, ReviewExtractor};
pub use model::{
    RatingLimits, RatingSummary, ReviewRecord, ReviewTimestamp, ScrapeRequest, ScrapeResult,
    ScrapeSummary, ScrollSpeed, StopReason, MAX_RATING, MIN_RATING,
};
pub use navigator::{FilterSelection, Navigator};
pub use paginator::{PageReady, Paginator};
pub use pipeline::{PipelineState, ReviewPipeline, RunReport};
pub use progress::{ProgressEvent, ProgressReporter};
pub use runner::{ScrapeHandle, ScrapeRunner};
pub use tokio_util::sync::CancellationToken;
pub use url::ProductUrl;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{
    BrowserError, BrowserLauncher, BrowserResult, BrowserSessionProvider, ReviewSession,
    ScrapeMetrics, SessionProvider,
};
use crate::config::ScraperConfig;
use crate::error::Result;

use super::extractor::ReviewExtractor;
use super::model::{RatingSummary, ReviewRecord, ScrapeRequest, ScrapeResult, StopReason};
use super::navigator::{FilterSelection, Navigator};
use super::paginator::Paginator;
use super::progress::ProgressReporter;

const FRACTION_INITIALIZING: f64 = 0.1;
const FRACTION_NAVIGATING: f64 = 0.15;
const FRACTION_EXTRACTION_START: f64 = 0.2;
const FRACTION_EXTRACTION_SPAN: f64 = 0.7;
const FRACTION_FINALIZING: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "rating", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Initializing,
    Navigating,
    Extracting(u8),
    Aggregating,
    Completed,
    Failed,
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Failed | PipelineState::Cancelled
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Initializing => f.write_str("initializing"),
            PipelineState::Navigating => f.write_str("navigating"),
            PipelineState::Extracting(rating) => write!(f, "extracting({rating})"),
            PipelineState::Aggregating => f.write_str("aggregating"),
            PipelineState::Completed => f.write_str("completed"),
            PipelineState::Failed => f.write_str("failed"),
            PipelineState::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// What a finished run looked like from the inside.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: PipelineState,
    pub history: Vec<PipelineState>,
    pub result: Option<ScrapeResult>,
    pub metrics: ScrapeMetrics,
}

enum Halt {
    Failed(String),
    Cancelled,
}

/// Mutable state of one run. Owned by `ReviewPipeline::run` and dropped with it.
struct RunContext {
    state: PipelineState,
    history: Vec<PipelineState>,
    records: Vec<ReviewRecord>,
    ratings: Vec<RatingSummary>,
    metrics: ScrapeMetrics,
    reporter: ProgressReporter,
    cancel: CancellationToken,
    pages_done: u32,
    pages_total: u32,
}

impl RunContext {
    fn new(reporter: ProgressReporter, cancel: CancellationToken, pages_total: u32) -> Self {
        Self {
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
            records: Vec::new(),
            ratings: Vec::new(),
            metrics: ScrapeMetrics::default(),
            reporter,
            cancel,
            pages_done: 0,
            pages_total,
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "pipeline state change");
        self.state = next;
        self.history.push(next);
    }

    fn extraction_fraction(&self) -> f64 {
        if self.pages_total == 0 {
            return FRACTION_EXTRACTION_START;
        }
        let done = self.pages_done.min(self.pages_total) as f64;
        FRACTION_EXTRACTION_START + FRACTION_EXTRACTION_SPAN * done / self.pages_total as f64
    }

    fn snapshot(&self) -> ScrapeResult {
        ScrapeResult::new(self.records.clone(), self.ratings.clone())
    }

    fn into_report(self, result: Option<ScrapeResult>) -> RunReport {
        RunReport {
            state: self.state,
            history: self.history,
            result,
            metrics: self.metrics,
        }
    }
}

/// Sequences session, navigation, pagination and extraction for one request
/// at a time. Holds no per-run state, so one instance can serve many runs.
pub struct ReviewPipeline {
    config: ScraperConfig,
    sessions: Arc<dyn SessionProvider>,
    extractor: ReviewExtractor,
}

impl ReviewPipeline {
    pub fn new(config: ScraperConfig, sessions: Arc<dyn SessionProvider>) -> Result<Self> {
        let extractor = ReviewExtractor::new(&config.selectors)?;
        Ok(Self {
            config,
            sessions,
            extractor,
        })
    }

    /// Pipeline backed by real Chromium sessions.
    pub fn with_browser(config: ScraperConfig) -> BrowserResult<Self> {
        let launcher = BrowserLauncher::new(config.clone())?;
        let sessions: Arc<dyn SessionProvider> = Arc::new(BrowserSessionProvider::new(launcher));
        Self::new(config, sessions).map_err(|err| BrowserError::Configuration(err.to_string()))
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn extractor(&self) -> &ReviewExtractor {
        &self.extractor
    }

    pub async fn run(
        &self,
        request: &ScrapeRequest,
        reporter: ProgressReporter,
        cancel: CancellationToken,
    ) -> RunReport {
        let mut ctx = RunContext::new(reporter, cancel, request.limits.total_pages());
        info!(
            url = %request.url,
            ratings = request.limits.len(),
            pages = request.limits.total_pages(),
            headless = request.headless,
            "scrape run starting"
        );

        ctx.transition(PipelineState::Initializing);
        ctx.reporter
            .progress("Initializing browser...", FRACTION_INITIALIZING);
        let mut session = match self.sessions.acquire(request.headless).await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "browser session could not be started");
                ctx.transition(PipelineState::Failed);
                ctx.reporter
                    .error(format!("Failed to initialize browser: {err}"));
                return ctx.into_report(None);
            }
        };
        ctx.reporter.success("Browser initialized successfully");

        let outcome = match self.drive(&mut ctx, session.as_mut(), request).await {
            Ok(()) => {
                ctx.transition(PipelineState::Aggregating);
                ctx.reporter
                    .progress("Finalizing results...", FRACTION_FINALIZING);
                Ok(ctx.snapshot())
            }
            Err(halt) => Err(halt),
        };

        if let Err(err) = session.release().await {
            warn!(error = %err, "browser session teardown failed");
            ctx.reporter
                .warning(format!("Browser teardown reported a problem: {err}"));
        }
        info!(
            pages_opened = ctx.metrics.pages_opened,
            filters_selected = ctx.metrics.filters_selected,
            page_advances = ctx.metrics.page_advances,
            stalls = ctx.metrics.stalls,
            extracted = ctx.metrics.entries_extracted,
            skipped = ctx.metrics.entries_skipped,
            "browser session released"
        );

        match outcome {
            Ok(result) => {
                ctx.transition(PipelineState::Completed);
                let total = result.len();
                let ratings = result.summary.ratings_scraped();
                ctx.reporter
                    .data(format!("Collected {total} reviews"), result.clone());
                ctx.reporter.complete(format!(
                    "Scraped {total} reviews across {ratings} rating filter(s)"
                ));
                info!(reviews = total, "scrape run completed");
                ctx.into_report(Some(result))
            }
            Err(Halt::Failed(message)) => {
                ctx.transition(PipelineState::Failed);
                ctx.reporter.error(message);
                ctx.into_report(None)
            }
            Err(Halt::Cancelled) => {
                ctx.transition(PipelineState::Cancelled);
                let collected = ctx.records.len();
                ctx.reporter.error(format!(
                    "Scrape cancelled after collecting {collected} reviews"
                ));
                info!(collected, "scrape run cancelled");
                ctx.into_report(None)
            }
        }
    }

    async fn drive(
        &self,
        ctx: &mut RunContext,
        session: &mut dyn ReviewSession,
        request: &ScrapeRequest,
    ) -> std::result::Result<(), Halt> {
        let navigator = Navigator::new(&self.config, &self.extractor);

        ctx.transition(PipelineState::Navigating);
        ctx.reporter
            .progress("Opening product page...", FRACTION_NAVIGATING);
        match unless_cancelled(&ctx.cancel, navigator.open(session, request.url.as_str())).await {
            None => return Err(Halt::Cancelled),
            Some(Err(err)) => {
                warn!(error = %err, "product page failed to load");
                return Err(Halt::Failed(format!("Failed to open product page: {err}")));
            }
            Some(Ok(())) => {}
        }
        ctx.metrics.record_page_open();
        ctx.reporter.success("Product page loaded");

        let requested = request.limits.requested().collect::<Vec<_>>();
        let count = requested.len();
        for (index, (rating, max_pages)) in requested.into_iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                return Err(Halt::Cancelled);
            }
            ctx.transition(PipelineState::Extracting(rating));
            let fraction = ctx.extraction_fraction();
            ctx.reporter.progress(
                format!(
                    "Scraping {rating}-star reviews ({}/{count}, up to {max_pages} page(s))",
                    index + 1
                ),
                fraction,
            );

            let summary = self
                .scrape_rating(ctx, &navigator, session, request, rating, max_pages)
                .await?;
            ctx.ratings.push(summary);

            if request.stream_partial {
                let partial = ctx.snapshot();
                ctx.reporter.data(
                    format!(
                        "Partial results after {rating}-star reviews: {} total",
                        partial.len()
                    ),
                    partial,
                );
            }
        }
        Ok(())
    }

    async fn scrape_rating(
        &self,
        ctx: &mut RunContext,
        navigator: &Navigator<'_>,
        session: &mut dyn ReviewSession,
        request: &ScrapeRequest,
        rating: u8,
        max_pages: u32,
    ) -> std::result::Result<RatingSummary, Halt> {
        let mut summary = RatingSummary::new(rating, max_pages);

        let selection =
            unless_cancelled(&ctx.cancel, navigator.select_rating_filter(session, rating)).await;
        match selection {
            None => return Err(Halt::Cancelled),
            Some(Ok(selection)) => {
                ctx.metrics.record_filter_selected();
                if selection == FilterSelection::AlreadyActive {
                    debug!(rating, "filter was already selected");
                }
            }
            Some(Err(err)) if err.is_fatal() => {
                warn!(rating, error = %err, "session lost while selecting rating filter");
                return Err(Halt::Failed(format!(
                    "Failed while selecting {rating}-star reviews: {err}"
                )));
            }
            Some(Err(err)) => {
                warn!(rating, error = %err, "rating filter unavailable");
                ctx.reporter
                    .warning(format!("Skipping {rating}-star reviews: {err}"));
                summary.stop_reason = StopReason::Failed;
                summary.error = Some(err.to_string());
                ctx.pages_done += max_pages;
                return Ok(summary);
            }
        }

        let mut paginator = Paginator::new(
            &self.config,
            &self.extractor,
            rating,
            max_pages,
            request.scroll_delay(),
        );
        let mut cancelled = false;
        let mut fatal = None;
        loop {
            if ctx.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let next = unless_cancelled(&ctx.cancel, paginator.next_page(session)).await;
            let page = match next {
                None => {
                    cancelled = true;
                    break;
                }
                Some(Ok(Some(page))) => page,
                Some(Ok(None)) => break,
                Some(Err(err)) if err.is_fatal() => {
                    fatal = Some(err);
                    break;
                }
                Some(Err(err)) => {
                    warn!(
                        rating,
                        page = paginator.pages() + 1,
                        error = %err,
                        "page advance failed"
                    );
                    ctx.reporter.warning(format!(
                        "Stopped {rating}-star reviews after {} page(s): {err}",
                        paginator.pages()
                    ));
                    summary.stop_reason = StopReason::Failed;
                    summary.error = Some(err.to_string());
                    break;
                }
            };

            let extracted = self.extractor.extract(
                &page.html,
                rating,
                page.page_number,
                request.normalize_text,
            );
            let found = extracted.records.len();
            ctx.metrics.record_extraction(found, extracted.skipped);
            if extracted.skipped > 0 {
                ctx.reporter.warning(format!(
                    "Page {} of {rating}-star reviews: skipped {} malformed review(s)",
                    page.page_number, extracted.skipped
                ));
            }
            summary.pages_retrieved = page.page_number;
            summary.reviews += found;
            summary.skipped_entries += extracted.skipped;
            ctx.records.extend(extracted.records);
            ctx.pages_done += 1;

            let fraction = ctx.extraction_fraction();
            ctx.reporter.progress(
                format!(
                    "Page {}/{max_pages} for {rating}-star: {found} reviews",
                    page.page_number
                ),
                fraction,
            );
        }

        ctx.metrics.record_advances(paginator.advances());
        ctx.metrics.record_stalls(paginator.stalls());
        // Pages never reached still count towards the overall fraction.
        ctx.pages_done += max_pages.saturating_sub(summary.pages_retrieved);

        if cancelled {
            return Err(Halt::Cancelled);
        }
        if let Some(err) = fatal {
            warn!(rating, error = %err, "session lost while paging");
            return Err(Halt::Failed(format!(
                "Failed after {} page(s) of {rating}-star reviews: {err}",
                summary.pages_retrieved
            )));
        }
        if summary.stop_reason != StopReason::Failed {
            summary.stop_reason = paginator.stop_reason().unwrap_or(StopReason::PageLimit);
        }
        if summary.stop_reason == StopReason::Stalled {
            ctx.reporter.warning(format!(
                "{rating}-star pagination stalled: retrieved {} of {max_pages} page(s)",
                summary.pages_retrieved
            ));
        }
        info!(
            rating,
            pages = summary.pages_retrieved,
            reviews = summary.reviews,
            stop = %summary.stop_reason,
            "rating filter finished"
        );
        ctx.reporter.success(format!(
            "Collected {} {rating}-star reviews from {} page(s)",
            summary.reviews, summary.pages_retrieved
        ));
        Ok(summary)
    }
}

/// Drives `work` unless the run is cancelled first; a pending wait is
/// dropped as soon as the token fires.
async fn unless_cancelled<F: Future>(cancel: &CancellationToken, work: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = work => Some(output),
    }
}

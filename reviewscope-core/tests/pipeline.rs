use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use reviewscope_core::browser::{
    BrowserError, BrowserResult, FilterControl, ReviewSession, SessionProvider,
};
use reviewscope_core::config::{load_scraper_config, ScraperConfig};
use reviewscope_core::reviews::{
    CancellationToken, PipelineState, ProductUrl, ProgressEvent, ProgressReporter, RatingLimits,
    ReviewPipeline, RunReport, ScrapeRequest, ScrapeRunner, StopReason,
};

const PRODUCT_URL: &str = "https://shopee.sg/product/180958533/13913101975";

fn config() -> ScraperConfig {
    load_scraper_config("../configs/scraper.toml").expect("shipped config loads")
}

#[derive(Clone, Default)]
struct Scenario {
    /// Pages each rating tab has; ratings absent here render an empty list.
    pages: BTreeMap<u8, u32>,
    reviews_per_page: usize,
    /// (rating, page) → number of entries rendered without any stars.
    malformed: BTreeMap<(u8, u32), usize>,
    stalling: BTreeSet<u8>,
    missing_filters: BTreeSet<u8>,
    /// Clicking these tabs is accepted but the page never changes.
    frozen_filters: BTreeSet<u8>,
    /// Clicking this tab bounces the browser to a verification page.
    redirect_on_filter: Option<u8>,
    /// Reads of the page that still show the previous tab after a click.
    render_lag: u32,
    initial_filter: Option<u8>,
    fail_acquire: bool,
    fail_goto: bool,
    no_product_marker: bool,
    cancel_on_next_click: Option<CancellationToken>,
}

#[derive(Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
    next_clicks: AtomicUsize,
}

struct MockProvider {
    config: ScraperConfig,
    scenario: Scenario,
    counters: Arc<Counters>,
}

#[async_trait(?Send)]
impl SessionProvider for MockProvider {
    async fn acquire(&self, _headless: bool) -> BrowserResult<Box<dyn ReviewSession>> {
        if self.scenario.fail_acquire {
            return Err(BrowserError::SessionInit(
                "chromium binary not found".to_string(),
            ));
        }
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            config: self.config.clone(),
            scenario: self.scenario.clone(),
            counters: Arc::clone(&self.counters),
            loaded: false,
            filter: self.scenario.initial_filter,
            pending: None,
            page: 1,
        }))
    }
}

struct MockSession {
    config: ScraperConfig,
    scenario: Scenario,
    counters: Arc<Counters>,
    loaded: bool,
    filter: Option<u8>,
    /// Tab a click switched to, and how many more reads show the old one.
    pending: Option<(Option<u8>, u32)>,
    page: u32,
}

impl MockSession {
    fn settle(&mut self) {
        match self.pending.take() {
            Some((target, 0)) => {
                self.filter = target;
                self.page = 1;
            }
            Some((target, reads)) => self.pending = Some((target, reads - 1)),
            None => {}
        }
    }

    fn available_pages(&self) -> u32 {
        match self.filter {
            Some(rating) => self.scenario.pages.get(&rating).copied().unwrap_or(0),
            None => 1,
        }
    }

    fn render(&self) -> String {
        if !self.loaded {
            return "<html><body></body></html>".to_string();
        }
        let mut body = String::new();
        if !self.scenario.no_product_marker {
            body.push_str(r#"<div class="product-briefing">Phone case</div>"#);
        }

        body.push_str(r#"<div class="product-rating-overview">"#);
        body.push_str(r#"<div class="product-rating-overview__filter">All</div>"#);
        for rating in (1..=5u8).rev() {
            if self.scenario.missing_filters.contains(&rating) {
                continue;
            }
            let class = if self.filter == Some(rating) {
                "product-rating-overview__filter product-rating-overview__filter--active"
            } else {
                "product-rating-overview__filter"
            };
            let count = self.scenario.pages.get(&rating).copied().unwrap_or(0);
            body.push_str(&format!(r#"<div class="{class}">{rating} Star ({count})</div>"#));
        }
        body.push_str("</div>");

        let shown_rating = self.filter.unwrap_or(5);
        let pages = self.available_pages();
        body.push_str(r#"<div class="product-ratings__list">"#);
        if pages == 0 {
            body.push_str(r#"<div class="product-ratings__list--no-rating">No ratings yet</div>"#);
        } else {
            let tab = self
                .filter
                .map(|r| r.to_string())
                .unwrap_or_else(|| "all".to_string());
            for index in 0..self.scenario.reviews_per_page {
                body.push_str(&entry(shown_rating, &tab, self.page, index));
            }
            let broken = self
                .scenario
                .malformed
                .get(&(shown_rating, self.page))
                .copied()
                .unwrap_or(0);
            for _ in 0..broken {
                body.push_str(&entry(0, &tab, self.page, 99));
            }
            let disabled = if self.page >= pages { " disabled" } else { "" };
            body.push_str(&format!(
                r#"<div class="product-ratings__page-controller"><button class="shopee-icon-button shopee-icon-button--right"{disabled}>&gt;</button></div>"#
            ));
        }
        body.push_str("</div>");
        format!("<html><body>{body}</body></html>")
    }
}

fn entry(stars: u8, tab: &str, page: u32, index: usize) -> String {
    let solid = r#"<i class="icon-rating-solid--active"></i>"#.repeat(stars as usize);
    format!(
        r#"<div class="shopee-product-rating">
             <div class="shopee-product-rating__author-name">buyer{index}</div>
             <div class="shopee-product-rating__rating">{solid}</div>
             <div class="shopee-product-rating__time">2024-01-{page:02} 10:{index:02} | Variation: Red</div>
             <div class="shopee-product-rating__main"><div style="margin:0">tab {tab} page {page} review {index}</div></div>
           </div>"#
    )
}

fn select(html: &str, selector: &str) -> Vec<(String, Vec<String>)> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(selector).expect("test selector parses");
    document
        .select(&selector)
        .map(|el| {
            (
                el.text().collect::<String>().trim().to_string(),
                el.value().classes().map(str::to_string).collect(),
            )
        })
        .collect()
}

#[async_trait(?Send)]
impl ReviewSession for MockSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        if self.scenario.fail_goto {
            return Err(BrowserError::Unexpected(format!(
                "net::ERR_NAME_NOT_RESOLVED at {url}"
            )));
        }
        self.loaded = true;
        Ok(())
    }

    async fn is_present(&mut self, selector: &str) -> BrowserResult<bool> {
        self.settle();
        Ok(!select(&self.render(), selector).is_empty())
    }

    async fn controls(
        &mut self,
        selector: &str,
        active_class: &str,
    ) -> BrowserResult<Vec<FilterControl>> {
        self.settle();
        Ok(select(&self.render(), selector)
            .into_iter()
            .map(|(label, classes)| FilterControl {
                active: classes.iter().any(|c| c == active_class),
                label,
            })
            .collect())
    }

    async fn click_nth(&mut self, selector: &str, index: usize) -> BrowserResult<bool> {
        let html = self.render();
        let matched = select(&html, selector);
        let Some((label, _)) = matched.get(index) else {
            return Ok(false);
        };
        if selector == self.config.selectors.rating_filter {
            let target = label.chars().next().and_then(|c| c.to_digit(10)).map(|d| d as u8);
            if target.is_some() && target == self.scenario.redirect_on_filter {
                return Err(BrowserError::Navigation {
                    url: "https://shopee.sg/verify/traffic".to_string(),
                    elapsed: Duration::from_millis(400),
                    reason: "redirected to verification page".to_string(),
                });
            }
            if target.is_some_and(|rating| self.scenario.frozen_filters.contains(&rating)) {
                return Ok(true);
            }
            if self.scenario.render_lag > 0 {
                self.pending = Some((target, self.scenario.render_lag));
            } else {
                self.filter = target;
                self.page = 1;
            }
        } else if selector == self.config.selectors.next_page {
            self.counters.next_clicks.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = &self.scenario.cancel_on_next_click {
                token.cancel();
            }
            let stalls = self
                .filter
                .map(|r| self.scenario.stalling.contains(&r))
                .unwrap_or(false);
            if !stalls && self.page < self.available_pages() {
                self.page += 1;
            }
        }
        Ok(true)
    }

    async fn scroll_into_view(&mut self, _selector: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn html(&mut self) -> BrowserResult<String> {
        self.settle();
        Ok(self.render())
    }

    async fn release(&mut self) -> BrowserResult<()> {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    pipeline: Arc<ReviewPipeline>,
    counters: Arc<Counters>,
}

impl Harness {
    fn new(scenario: Scenario) -> Self {
        let config = config();
        let counters = Arc::new(Counters::default());
        let provider = MockProvider {
            config: config.clone(),
            scenario,
            counters: Arc::clone(&counters),
        };
        let pipeline = ReviewPipeline::new(config, Arc::new(provider)).expect("pipeline builds");
        Self {
            pipeline: Arc::new(pipeline),
            counters,
        }
    }

    async fn run(&self, limits: RatingLimits) -> (RunReport, Vec<ProgressEvent>) {
        self.run_with(limits, CancellationToken::new()).await
    }

    async fn run_with(
        &self,
        limits: RatingLimits,
        cancel: CancellationToken,
    ) -> (RunReport, Vec<ProgressEvent>) {
        let request = ScrapeRequest::new(ProductUrl::parse(PRODUCT_URL).unwrap(), limits);
        let (reporter, mut receiver) = ProgressReporter::channel();
        let report = self.pipeline.run(&request, reporter, cancel).await;
        (report, drain(&mut receiver))
    }

    fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }
}

fn drain(receiver: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

fn warnings(events: &[ProgressEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Warning { message } => Some(message.as_str()),
            _ => None,
        })
        .collect()
}

fn assert_single_terminal_last(events: &[ProgressEvent]) {
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1, "events: {events:#?}");
    assert!(events.last().map(ProgressEvent::is_terminal).unwrap_or(false));
}

fn scenario(pages: &[(u8, u32)]) -> Scenario {
    Scenario {
        pages: pages.iter().copied().collect(),
        reviews_per_page: 3,
        ..Scenario::default()
    }
}

fn limits(pairs: &[(u8, u32)]) -> RatingLimits {
    RatingLimits::from_pairs(pairs.iter().map(|(r, p)| (*r, Some(*p)))).unwrap()
}

#[tokio::test(start_paused = true)]
async fn zero_limits_complete_with_empty_result() {
    let harness = Harness::new(scenario(&[(5, 3)]));
    let (report, events) = harness.run(limits(&[(1, 0), (5, 0)])).await;

    assert_eq!(report.state, PipelineState::Completed);
    assert!(!report
        .history
        .iter()
        .any(|state| matches!(state, PipelineState::Extracting(_))));
    assert!(report.result.as_ref().unwrap().is_empty());
    assert_eq!(harness.released(), 1);
    assert_single_terminal_last(&events);
    assert!(matches!(events.last(), Some(ProgressEvent::Complete { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::Data { result, .. } if result.is_empty()
    )));
}

#[tokio::test(start_paused = true)]
async fn ratings_visited_in_ascending_order_within_caps() {
    let harness = Harness::new(scenario(&[(1, 3), (3, 3), (5, 3)]));
    let (report, events) = harness.run(limits(&[(5, 1), (1, 2)])).await;

    assert_eq!(report.state, PipelineState::Completed);
    let extracting = report
        .history
        .iter()
        .filter_map(|state| match state {
            PipelineState::Extracting(rating) => Some(*rating),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(extracting, vec![1, 5]);

    let result = report.result.unwrap();
    let order = result
        .records
        .iter()
        .map(|r| (r.rating_filter, r.page_number))
        .collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![(1, 1), (1, 1), (1, 1), (1, 2), (1, 2), (1, 2), (5, 1), (5, 1), (5, 1)]
    );
    assert!(result
        .records
        .iter()
        .all(|r| r.actual_rating == r.rating_filter));
    assert!(result.records[0].comment.starts_with("tab 1 page 1"));
    assert_eq!(result.records[0].variation.as_deref(), Some("Red"));
    assert_eq!(report.metrics.page_advances, 1);
    assert_eq!(harness.counters.next_clicks.load(Ordering::SeqCst), 1);
    assert_eq!(harness.released(), 1);

    let summary = &result.summary;
    assert_eq!(summary.total_reviews, 9);
    assert_eq!(summary.ratings.len(), 2);
    assert_eq!(summary.ratings[0].pages_retrieved, 2);
    assert_eq!(summary.ratings[0].stop_reason, StopReason::PageLimit);
    assert_eq!(summary.ratings[1].pages_retrieved, 1);

    let progress = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Progress { .. }))
        .count();
    assert!(progress >= 2 + 3, "one per rating and one per page");
    assert_single_terminal_last(&events);
}

#[tokio::test(start_paused = true)]
async fn end_of_content_stops_before_cap() {
    let harness = Harness::new(scenario(&[(2, 2)]));
    let (report, events) = harness.run(limits(&[(2, 5)])).await;

    let result = report.result.unwrap();
    assert_eq!(result.summary.ratings[0].pages_retrieved, 2);
    assert_eq!(result.summary.ratings[0].stop_reason, StopReason::EndOfContent);
    assert!(report.metrics.page_advances <= 5);
    assert!(warnings(&events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn two_stalls_warn_and_continue() {
    let mut scenario = scenario(&[(3, 5), (4, 1)]);
    scenario.stalling.insert(3);
    let harness = Harness::new(scenario);
    let (report, events) = harness.run(limits(&[(3, 4), (4, 1)])).await;

    assert_eq!(report.state, PipelineState::Completed);
    let result = report.result.unwrap();
    assert_eq!(result.summary.ratings[0].stop_reason, StopReason::Stalled);
    assert_eq!(result.summary.ratings[0].pages_retrieved, 1);
    assert_eq!(report.metrics.stalls, 2);
    assert_eq!(harness.counters.next_clicks.load(Ordering::SeqCst), 2);
    assert!(warnings(&events)
        .iter()
        .any(|w| w.contains("retrieved 1 of 4")));
    assert!(result.records.iter().any(|r| r.rating_filter == 4));
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::Error { .. })));
}

#[tokio::test(start_paused = true)]
async fn malformed_entries_are_skipped_with_warning() {
    let mut scenario = scenario(&[(4, 1)]);
    scenario.malformed.insert((4, 1), 2);
    let harness = Harness::new(scenario);
    let (report, events) = harness.run(limits(&[(4, 1)])).await;

    let result = report.result.unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result.summary.ratings[0].skipped_entries, 2);
    assert_eq!(report.metrics.entries_skipped, 2);
    let warnings = warnings(&events);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("skipped 2"));
}

#[tokio::test(start_paused = true)]
async fn missing_filter_is_skipped() {
    let mut scenario = scenario(&[(2, 1), (3, 1)]);
    scenario.missing_filters.insert(2);
    let harness = Harness::new(scenario);
    let (report, events) = harness.run(limits(&[(2, 1), (3, 1)])).await;

    assert_eq!(report.state, PipelineState::Completed);
    let result = report.result.unwrap();
    assert!(result.records.iter().all(|r| r.rating_filter == 3));
    assert_eq!(result.summary.ratings[0].stop_reason, StopReason::Failed);
    assert!(warnings(&events)
        .iter()
        .any(|w| w.starts_with("Skipping 2-star")));
    assert!(matches!(events.last(), Some(ProgressEvent::Complete { .. })));
}

#[tokio::test(start_paused = true)]
async fn refresh_that_never_happens_skips_the_rating() {
    let mut scenario = scenario(&[(3, 2), (4, 1)]);
    scenario.frozen_filters.insert(3);
    let harness = Harness::new(scenario);
    let (report, events) = harness.run(limits(&[(3, 2), (4, 1)])).await;

    assert_eq!(report.state, PipelineState::Completed);
    let result = report.result.unwrap();
    let skipped = &result.summary.ratings[0];
    assert_eq!(skipped.rating, 3);
    assert_eq!(skipped.stop_reason, StopReason::Failed);
    assert!(skipped.error.as_deref().unwrap_or("").contains("timeout"));
    assert!(warnings(&events)
        .iter()
        .any(|w| w.starts_with("Skipping 3-star") && w.contains("timeout")));
    assert_eq!(result.records.len(), 3);
    assert!(result.records.iter().all(|r| r.rating_filter == 4));
    assert_eq!(result.summary.ratings[1].stop_reason, StopReason::PageLimit);
    assert!(matches!(events.last(), Some(ProgressEvent::Complete { .. })));
}

#[tokio::test(start_paused = true)]
async fn lagging_render_after_empty_tab_is_waited_out() {
    let mut scenario = scenario(&[(2, 1)]);
    scenario.render_lag = 8;
    let harness = Harness::new(scenario);
    let (report, events) = harness.run(limits(&[(1, 1), (2, 1)])).await;

    assert_eq!(report.state, PipelineState::Completed);
    let result = report.result.unwrap();
    assert_eq!(result.summary.ratings[0].reviews, 0);
    assert_eq!(result.summary.ratings[1].reviews, 3);
    assert!(result
        .records
        .iter()
        .all(|r| r.rating_filter == 2 && r.comment.starts_with("tab 2")));
    assert!(warnings(&events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn session_level_error_during_filter_selection_is_fatal() {
    let mut scenario = scenario(&[(1, 1), (2, 1), (3, 1)]);
    scenario.redirect_on_filter = Some(2);
    let harness = Harness::new(scenario);
    let (report, events) = harness.run(limits(&[(1, 1), (2, 1), (3, 1)])).await;

    assert_eq!(report.state, PipelineState::Failed);
    assert!(!report.history.contains(&PipelineState::Extracting(3)));
    assert!(report.result.is_none());
    assert_eq!(harness.released(), 1);
    assert_single_terminal_last(&events);
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::Error { message })
            if message.contains("2-star") && message.contains("verification page")
    ));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_pending_wait() {
    let mut scenario = scenario(&[(3, 1), (4, 1)]);
    scenario.frozen_filters.insert(3);
    let harness = Harness::new(scenario);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let (report, events) = harness.run_with(limits(&[(3, 1), (4, 1)]), cancel).await;

    assert_eq!(report.state, PipelineState::Cancelled);
    assert!(started.elapsed() < config().timeouts.filter_refresh());
    assert!(!report.history.contains(&PipelineState::Extracting(4)));
    assert!(warnings(&events).is_empty());
    assert_eq!(harness.released(), 1);
    assert_single_terminal_last(&events);
}

#[tokio::test(start_paused = true)]
async fn empty_rating_yields_no_records() {
    let harness = Harness::new(scenario(&[(5, 1)]));
    let (report, _events) = harness.run(limits(&[(1, 3), (5, 1)])).await;

    let result = report.result.unwrap();
    assert!(result.records.iter().all(|r| r.rating_filter == 5));
    assert_eq!(result.summary.ratings[0].reviews, 0);
    assert_eq!(result.summary.ratings[0].stop_reason, StopReason::EndOfContent);
}

#[tokio::test(start_paused = true)]
async fn reselecting_active_filter_is_a_no_op() {
    let mut scenario = scenario(&[(5, 1)]);
    scenario.initial_filter = Some(5);
    let harness = Harness::new(scenario);
    let (report, events) = harness.run(limits(&[(5, 1)])).await;

    assert_eq!(report.result.unwrap().len(), 3);
    assert!(warnings(&events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn navigation_failure_releases_once() {
    let mut scenario = scenario(&[(5, 1)]);
    scenario.fail_goto = true;
    let harness = Harness::new(scenario);
    let (report, events) = harness.run(limits(&[(5, 1)])).await;

    assert_eq!(report.state, PipelineState::Failed);
    assert!(report.result.is_none());
    assert_eq!(harness.released(), 1);
    assert_single_terminal_last(&events);
    match events.last() {
        Some(ProgressEvent::Error { message }) => {
            assert!(message.contains("ERR_NAME_NOT_RESOLVED"), "{message}")
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::Data { .. })));
}

#[tokio::test(start_paused = true)]
async fn missing_product_marker_times_out() {
    let mut scenario = scenario(&[(5, 1)]);
    scenario.no_product_marker = true;
    let harness = Harness::new(scenario);
    let (report, events) = harness.run(limits(&[(5, 1)])).await;

    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(harness.released(), 1);
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::Error { message }) if message.contains("product marker")
    ));
}

#[tokio::test(start_paused = true)]
async fn acquire_failure_is_fatal() {
    let mut scenario = scenario(&[(5, 1)]);
    scenario.fail_acquire = true;
    let harness = Harness::new(scenario);
    let (report, events) = harness.run(limits(&[(5, 1)])).await;

    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(
        report.history,
        vec![
            PipelineState::Idle,
            PipelineState::Initializing,
            PipelineState::Failed
        ]
    );
    assert_eq!(harness.counters.acquired.load(Ordering::SeqCst), 0);
    assert_eq!(harness.released(), 0);
    assert_single_terminal_last(&events);
    assert!(events.last().unwrap().message().contains("chromium binary"));
}

#[tokio::test(start_paused = true)]
async fn cancellation_between_pages() {
    let cancel = CancellationToken::new();
    let mut scenario = scenario(&[(1, 3), (2, 1)]);
    scenario.cancel_on_next_click = Some(cancel.clone());
    let harness = Harness::new(scenario);
    let (report, events) = harness.run_with(limits(&[(1, 3), (2, 1)]), cancel).await;

    assert_eq!(report.state, PipelineState::Cancelled);
    assert!(!report.history.contains(&PipelineState::Extracting(2)));
    assert_eq!(harness.released(), 1);
    assert_single_terminal_last(&events);
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::Error { message }) if message.contains("cancelled")
    ));
}

#[tokio::test(start_paused = true)]
async fn partial_results_stream_per_rating() {
    let harness = Harness::new(scenario(&[(1, 1), (2, 1)]));
    let request = ScrapeRequest::new(
        ProductUrl::parse(PRODUCT_URL).unwrap(),
        limits(&[(1, 1), (2, 1)]),
    )
    .with_stream_partial(true);
    let (reporter, mut receiver) = ProgressReporter::channel();
    harness
        .pipeline
        .run(&request, reporter, CancellationToken::new())
        .await;
    let sizes = drain(&mut receiver)
        .into_iter()
        .filter_map(|event| match event {
            ProgressEvent::Data { result, .. } => Some(result.len()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(sizes, vec![3, 6, 6]);
}

#[test]
fn runner_streams_events_from_worker_thread() {
    let harness = Harness::new(scenario(&[(5, 1)]));
    let request = ScrapeRequest::new(ProductUrl::parse(PRODUCT_URL).unwrap(), limits(&[(5, 1)]));
    let mut handle = ScrapeRunner::spawn(Arc::clone(&harness.pipeline), request).unwrap();

    let mut events = Vec::new();
    while let Some(event) = handle.blocking_next_event() {
        events.push(event);
    }
    let report = handle.join().unwrap();

    assert_eq!(report.state, PipelineState::Completed);
    assert!(matches!(events.first(), Some(ProgressEvent::Progress { .. })));
    assert_single_terminal_last(&events);
    let data_index = events
        .iter()
        .position(|e| matches!(e, ProgressEvent::Data { .. }))
        .unwrap();
    assert_eq!(data_index, events.len() - 2);
    assert_eq!(harness.released(), 1);
}

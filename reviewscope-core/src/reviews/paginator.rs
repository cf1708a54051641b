use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::browser::{BrowserResult, ReviewSession, WaitPolicy};
use crate::config::{ScraperConfig, SelectorSection};

use super::extractor::ReviewExtractor;
use super::model::StopReason;

const MAX_CONSECUTIVE_STALLS: u32 = 2;

/// A rendered review page, ready for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReady {
    pub page_number: u32,
    pub html: String,
}

enum AdvanceOutcome {
    NewContent(String),
    EndOfContent,
    Stalled,
}

/// Walks the pages of the currently selected rating filter. The first page is
/// whatever the filter selection left on screen; each later one costs an
/// advance attempt, and attempts never exceed `max_pages`.
///
/// Once `next_page` has returned `None` it keeps returning `None`.
#[derive(Debug)]
pub struct Paginator<'a> {
    selectors: &'a SelectorSection,
    extractor: &'a ReviewExtractor,
    policy: WaitPolicy,
    scroll_delay: Duration,
    rating: u8,
    max_pages: u32,
    pages: u32,
    advances: u32,
    stalls: u32,
    consecutive_stalls: u32,
    last_signature: Option<String>,
    stop: Option<StopReason>,
}

impl<'a> Paginator<'a> {
    pub fn new(
        config: &'a ScraperConfig,
        extractor: &'a ReviewExtractor,
        rating: u8,
        max_pages: u32,
        scroll_delay: Duration,
    ) -> Self {
        Self {
            selectors: &config.selectors,
            extractor,
            policy: WaitPolicy::new(
                config.timeouts.page_advance(),
                config.timeouts.poll_interval(),
            ),
            scroll_delay,
            rating,
            max_pages,
            pages: 0,
            advances: 0,
            stalls: 0,
            consecutive_stalls: 0,
            last_signature: None,
            stop: None,
        }
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    pub fn advances(&self) -> u32 {
        self.advances
    }

    pub fn stalls(&self) -> u32 {
        self.stalls
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    pub async fn next_page(
        &mut self,
        session: &mut dyn ReviewSession,
    ) -> BrowserResult<Option<PageReady>> {
        if self.stop.is_some() {
            return Ok(None);
        }
        if self.max_pages == 0 {
            return Ok(self.finish(StopReason::PageLimit));
        }
        if self.pages == 0 {
            let html = session.html().await?;
            self.last_signature = self.extractor.signature(&html);
            return Ok(Some(self.ready(html)));
        }

        loop {
            if self.pages >= self.max_pages {
                return Ok(self.finish(StopReason::PageLimit));
            }
            if self.advances >= self.max_pages {
                return Ok(self.finish(StopReason::Stalled));
            }
            match self.advance(session).await? {
                AdvanceOutcome::NewContent(html) => {
                    self.consecutive_stalls = 0;
                    return Ok(Some(self.ready(html)));
                }
                AdvanceOutcome::EndOfContent => {
                    return Ok(self.finish(StopReason::EndOfContent));
                }
                AdvanceOutcome::Stalled => {
                    self.stalls += 1;
                    self.consecutive_stalls += 1;
                    if self.consecutive_stalls >= MAX_CONSECUTIVE_STALLS {
                        warn!(
                            rating = self.rating,
                            pages = self.pages,
                            requested = self.max_pages,
                            "pagination stalled twice, giving up"
                        );
                        return Ok(self.finish(StopReason::Stalled));
                    }
                    debug!(
                        rating = self.rating,
                        page = self.pages + 1,
                        "page advance stalled, retrying"
                    );
                }
            }
        }
    }

    async fn advance(&mut self, session: &mut dyn ReviewSession) -> BrowserResult<AdvanceOutcome> {
        if session.is_present(&self.selectors.end_of_content).await? {
            return Ok(AdvanceOutcome::EndOfContent);
        }
        session.scroll_into_view(&self.selectors.review_list).await?;
        self.advances += 1;
        if !session.click_nth(&self.selectors.next_page, 0).await? {
            debug!(rating = self.rating, "no next-page control");
            return Ok(AdvanceOutcome::EndOfContent);
        }
        sleep(self.scroll_delay).await;

        let mut wait = self
            .policy
            .start(format!("{}-star page {}", self.rating, self.pages + 1));
        loop {
            let html = session.html().await?;
            let signature = self.extractor.signature(&html);
            if signature.is_some() && signature != self.last_signature {
                self.last_signature = signature;
                return Ok(AdvanceOutcome::NewContent(html));
            }
            if session.is_present(&self.selectors.end_of_content).await? {
                return Ok(AdvanceOutcome::EndOfContent);
            }
            if wait.tick().await.is_err() {
                return Ok(AdvanceOutcome::Stalled);
            }
        }
    }

    fn ready(&mut self, html: String) -> PageReady {
        self.pages += 1;
        PageReady {
            page_number: self.pages,
            html,
        }
    }

    fn finish(&mut self, reason: StopReason) -> Option<PageReady> {
        debug!(
            rating = self.rating,
            pages = self.pages,
            reason = %reason,
            "pagination finished"
        );
        self.stop = Some(reason);
        None
    }
}

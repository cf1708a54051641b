use regex::Regex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::browser::{BrowserError, BrowserResult, ReviewSession, WaitPolicy};
use crate::config::{ScraperConfig, SelectorSection};

use super::extractor::ReviewExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSelection {
    Selected,
    AlreadyActive,
}

/// Opens product pages and switches between rating tabs.
#[derive(Debug)]
pub struct Navigator<'a> {
    selectors: &'a SelectorSection,
    extractor: &'a ReviewExtractor,
    navigation: WaitPolicy,
    filter_refresh: WaitPolicy,
    label: Regex,
}

impl<'a> Navigator<'a> {
    pub fn new(config: &'a ScraperConfig, extractor: &'a ReviewExtractor) -> Self {
        let poll = config.timeouts.poll_interval();
        Self {
            selectors: &config.selectors,
            extractor,
            navigation: WaitPolicy::new(config.timeouts.navigation(), poll),
            filter_refresh: WaitPolicy::new(config.timeouts.filter_refresh(), poll),
            label: Regex::new(r"(?i)^\s*([1-5])\s*(?:stars?|★|⭐)").expect("valid regex"),
        }
    }

    /// Rating a filter control stands for, read from its visible label
    /// (`"4 Star (12)"` → 4).
    pub fn filter_rating(&self, label: &str) -> Option<u8> {
        self.label
            .captures(label)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    pub async fn open(&self, session: &mut dyn ReviewSession, url: &str) -> BrowserResult<()> {
        let started = Instant::now();
        info!(url, "opening product page");
        session.goto(url).await.map_err(|err| match err {
            BrowserError::Navigation { .. } => err,
            other => BrowserError::Navigation {
                url: url.to_string(),
                elapsed: started.elapsed(),
                reason: other.to_string(),
            },
        })?;

        let marker = self.selectors.product_marker.as_str();
        let mut wait = self.navigation.start("product page");
        loop {
            if session.is_present(marker).await? {
                debug!(
                    url,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "product page ready"
                );
                return Ok(());
            }
            if wait.tick().await.is_err() {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    elapsed: started.elapsed(),
                    reason: format!("product marker {marker:?} never appeared"),
                });
            }
        }
    }

    pub async fn select_rating_filter(
        &self,
        session: &mut dyn ReviewSession,
        rating: u8,
    ) -> BrowserResult<FilterSelection> {
        let selector = self.selectors.rating_filter.as_str();
        let before = self.extractor.signature(&session.html().await?);
        let controls = session
            .controls(selector, &self.selectors.rating_filter_active_class)
            .await?;

        let Some(index) = controls
            .iter()
            .position(|control| self.filter_rating(&control.label) == Some(rating))
        else {
            return Err(BrowserError::FilterNotFound {
                rating,
                available: controls.into_iter().map(|c| c.label).collect(),
            });
        };
        if controls[index].active {
            debug!(rating, "rating filter already active");
            return Ok(FilterSelection::AlreadyActive);
        }

        if !session.click_nth(selector, index).await? {
            return Err(BrowserError::FilterNotFound {
                rating,
                available: controls.into_iter().map(|c| c.label).collect(),
            });
        }

        // Neither a new list nor the empty marker counts until the tab itself
        // shows as active: an empty previous tab leaves the same marker behind.
        let mut wait = self.filter_refresh.start(format!("{rating}-star review list"));
        loop {
            if self.is_active(session, rating).await? {
                let current = self.extractor.signature(&session.html().await?);
                if current.is_some() && current != before {
                    break;
                }
                if session.is_present(&self.selectors.empty_list).await? {
                    debug!(rating, "rating filter has no reviews");
                    break;
                }
            }
            wait.tick().await?;
        }
        info!(rating, label = %controls[index].label, "rating filter selected");
        Ok(FilterSelection::Selected)
    }

    async fn is_active(&self, session: &mut dyn ReviewSession, rating: u8) -> BrowserResult<bool> {
        let controls = session
            .controls(
                &self.selectors.rating_filter,
                &self.selectors.rating_filter_active_class,
            )
            .await?;
        Ok(controls
            .iter()
            .any(|control| control.active && self.filter_rating(&control.label) == Some(rating)))
    }
}

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::config::SelectorSection;
use crate::error::{ConfigError, Result};

use super::model::{ReviewRecord, ReviewTimestamp, MAX_RATING, MIN_RATING};

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d"];

/// Records pulled from one rendered page plus the entries that could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    pub records: Vec<ReviewRecord>,
    pub skipped: usize,
}

/// Turns a rendered page into review records. Selectors are compiled once
/// from configuration; extraction itself never touches the network.
#[derive(Debug)]
pub struct ReviewExtractor {
    list: Selector,
    entry: Selector,
    star_active: Selector,
    author: Selector,
    timestamp: Selector,
    comment: Vec<Selector>,
    variation_prefix: Regex,
}

impl ReviewExtractor {
    pub fn new(selectors: &SelectorSection) -> Result<Self> {
        let comment = selectors
            .comment
            .iter()
            .map(|selector| compile(selector))
            .collect::<Result<Vec<_>>>()?;
        if comment.is_empty() {
            return Err(ConfigError::Selector {
                selector: String::new(),
                reason: "at least one comment selector is required".into(),
            });
        }
        Ok(Self {
            list: compile(&selectors.review_list)?,
            entry: compile(&selectors.review_entry)?,
            star_active: compile(&selectors.rating_star_active)?,
            author: compile(&selectors.author)?,
            timestamp: compile(&selectors.timestamp)?,
            comment,
            variation_prefix: Regex::new(r"(?i)^\s*variation\s*:\s*").expect("valid regex"),
        })
    }

    pub fn extract(
        &self,
        html: &str,
        rating_filter: u8,
        page_number: u32,
        normalize: bool,
    ) -> PageExtraction {
        let document = Html::parse_document(html);
        let mut page = PageExtraction::default();
        let Some(list) = document.select(&self.list).next() else {
            debug!(rating = rating_filter, page = page_number, "review list not rendered");
            return page;
        };
        for (index, entry) in list.select(&self.entry).enumerate() {
            match self.read_entry(entry, rating_filter, page_number, normalize) {
                Some(record) => page.records.push(record),
                None => {
                    debug!(
                        rating = rating_filter,
                        page = page_number,
                        index,
                        "skipping malformed review entry"
                    );
                    page.skipped += 1;
                }
            }
        }
        trace!(
            rating = rating_filter,
            page = page_number,
            records = page.records.len(),
            skipped = page.skipped,
            "page extracted"
        );
        page
    }

    /// Digest of the visible review entries, used to notice that the list
    /// re-rendered. `None` while the list container is absent.
    pub fn signature(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let list = document.select(&self.list).next()?;
        let mut hasher = Sha256::new();
        for entry in list.select(&self.entry) {
            hasher.update(element_text(entry).as_bytes());
            hasher.update(b"\x1f");
        }
        Some(hex::encode(hasher.finalize()))
    }

    fn read_entry(
        &self,
        entry: ElementRef<'_>,
        rating_filter: u8,
        page_number: u32,
        normalize: bool,
    ) -> Option<ReviewRecord> {
        let stars = entry.select(&self.star_active).count();
        let actual_rating = u8::try_from(stars).ok()?;
        if !(MIN_RATING..=MAX_RATING).contains(&actual_rating) {
            return None;
        }

        let clean = |raw: String| if normalize { normalize_text(&raw) } else { raw };

        let author = entry
            .select(&self.author)
            .next()
            .map(|el| normalize_text(&element_text(el)))
            .filter(|name| !name.is_empty());

        let (timestamp, variation) = match entry.select(&self.timestamp).next() {
            Some(el) => self.split_time_line(&element_text(el)),
            None => (None, None),
        };

        let comment = self
            .comment
            .iter()
            .find_map(|selector| entry.select(selector).next())
            .map(|el| clean(element_text(el)))
            .unwrap_or_default();

        Some(ReviewRecord {
            rating_filter,
            actual_rating,
            timestamp,
            comment,
            page_number,
            author,
            variation,
        })
    }

    /// The time line reads `<date> | Variation: <option>`.
    fn split_time_line(&self, line: &str) -> (Option<ReviewTimestamp>, Option<String>) {
        let line = normalize_text(line);
        let (date, variation) = match line.split_once('|') {
            Some((date, rest)) => (date, Some(rest)),
            None => (line.as_str(), None),
        };
        let variation = variation
            .map(|rest| self.variation_prefix.replace(rest, "").trim().to_string())
            .filter(|value| !value.is_empty());
        (parse_timestamp(date), variation)
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|err| ConfigError::Selector {
        selector: selector.to_string(),
        reason: err.to_string(),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// Tries the known display formats; anything else is kept verbatim.
pub fn parse_timestamp(raw: &str) -> Option<ReviewTimestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ReviewTimestamp::Parsed(value));
        }
    }
    for format in DATE_FORMATS {
        if let Some(value) = NaiveDate::parse_from_str(raw, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Some(ReviewTimestamp::Parsed(value));
        }
    }
    Some(ReviewTimestamp::Unparsed(raw.to_string()))
}

/// Drops control characters, collapses whitespace runs and trims. Control
/// characters that are also whitespace (`\n`, `\t`) still separate words.
pub fn normalize_text(raw: &str) -> String {
    let without_controls: String = raw
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();
    without_controls
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

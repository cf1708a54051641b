use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::error::{RequestError, RequestResult};
use super::url::ProductUrl;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// When a review was posted, as far as the page tells us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReviewTimestamp {
    Parsed(NaiveDateTime),
    /// Displayed text that matched none of the known formats.
    Unparsed(String),
}

impl ReviewTimestamp {
    pub fn parsed(&self) -> Option<NaiveDateTime> {
        match self {
            ReviewTimestamp::Parsed(value) => Some(*value),
            ReviewTimestamp::Unparsed(_) => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ReviewTimestamp::Parsed(_))
    }
}

impl fmt::Display for ReviewTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewTimestamp::Parsed(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M")),
            ReviewTimestamp::Unparsed(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Tab the review was collected under.
    pub rating_filter: u8,
    /// Stars shown on the review itself; may disagree with the tab.
    pub actual_rating: u8,
    pub timestamp: Option<ReviewTimestamp>,
    pub comment: String,
    pub page_number: u32,
    pub author: Option<String>,
    pub variation: Option<String>,
}

impl ReviewRecord {
    pub fn rating_mismatch(&self) -> bool {
        self.rating_filter != self.actual_rating
    }
}

/// Page caps per star rating. Zero caps are never stored, so every entry is
/// a rating that will be visited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<u8, u32>", into = "BTreeMap<u8, u32>")]
pub struct RatingLimits(BTreeMap<u8, u32>);

impl RatingLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, rating: u8, max_pages: u32) -> RequestResult<()> {
        validate_rating(rating)?;
        if max_pages == 0 {
            self.0.remove(&rating);
        } else {
            self.0.insert(rating, max_pages);
        }
        Ok(())
    }

    pub fn with(mut self, rating: u8, max_pages: u32) -> RequestResult<Self> {
        self.set(rating, max_pages)?;
        Ok(self)
    }

    pub fn from_pairs<I>(pairs: I) -> RequestResult<Self>
    where
        I: IntoIterator<Item = (u8, Option<u32>)>,
    {
        let mut limits = Self::new();
        for (rating, pages) in pairs {
            limits.set(rating, pages.unwrap_or(0))?;
        }
        Ok(limits)
    }

    /// Parses `RATING=PAGES`, e.g. `5=3`.
    pub fn parse_entry(entry: &str) -> RequestResult<(u8, u32)> {
        let (rating, pages) = entry
            .split_once('=')
            .ok_or_else(|| RequestError::LimitSyntax(entry.to_string()))?;
        let rating = rating
            .trim()
            .parse::<u8>()
            .map_err(|_| RequestError::LimitSyntax(entry.to_string()))?;
        let pages = pages
            .trim()
            .parse::<u32>()
            .map_err(|_| RequestError::LimitSyntax(entry.to_string()))?;
        validate_rating(rating)?;
        Ok((rating, pages))
    }

    pub fn get(&self, rating: u8) -> Option<u32> {
        self.0.get(&rating).copied()
    }

    /// Ratings to visit in ascending order with their caps.
    pub fn requested(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.0.iter().map(|(rating, pages)| (*rating, *pages))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn total_pages(&self) -> u32 {
        self.0.values().sum()
    }
}

impl TryFrom<BTreeMap<u8, u32>> for RatingLimits {
    type Error = RequestError;

    fn try_from(value: BTreeMap<u8, u32>) -> Result<Self, Self::Error> {
        Self::from_pairs(value.into_iter().map(|(rating, pages)| (rating, Some(pages))))
    }
}

impl From<RatingLimits> for BTreeMap<u8, u32> {
    fn from(value: RatingLimits) -> Self {
        value.0
    }
}

fn validate_rating(rating: u8) -> RequestResult<()> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(RequestError::RatingOutOfRange(rating))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollSpeed {
    Fast,
    #[default]
    Medium,
    Slow,
}

impl ScrollSpeed {
    /// Settle time after each page advance. Faster settings risk reading
    /// the list before lazy content arrives.
    pub fn delay(self) -> Duration {
        match self {
            ScrollSpeed::Fast => Duration::from_secs(1),
            ScrollSpeed::Medium => Duration::from_secs(2),
            ScrollSpeed::Slow => Duration::from_secs(3),
        }
    }
}

impl fmt::Display for ScrollSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScrollSpeed::Fast => "fast",
            ScrollSpeed::Medium => "medium",
            ScrollSpeed::Slow => "slow",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for ScrollSpeed {
    type Err = RequestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "fast" => Ok(ScrollSpeed::Fast),
            "medium" => Ok(ScrollSpeed::Medium),
            "slow" => Ok(ScrollSpeed::Slow),
            other => Err(RequestError::ScrollSpeed(other.to_string())),
        }
    }
}

/// Everything one run needs. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub url: ProductUrl,
    pub limits: RatingLimits,
    pub scroll_speed: ScrollSpeed,
    pub headless: bool,
    pub normalize_text: bool,
    /// Emit a `Data` event with the records gathered so far after each rating.
    pub stream_partial: bool,
}

impl ScrapeRequest {
    pub fn new(url: ProductUrl, limits: RatingLimits) -> Self {
        Self {
            url,
            limits,
            scroll_speed: ScrollSpeed::default(),
            headless: false,
            normalize_text: true,
            stream_partial: false,
        }
    }

    pub fn with_scroll_speed(mut self, speed: ScrollSpeed) -> Self {
        self.scroll_speed = speed;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_normalize_text(mut self, normalize: bool) -> Self {
        self.normalize_text = normalize;
        self
    }

    pub fn with_stream_partial(mut self, stream: bool) -> Self {
        self.stream_partial = stream;
        self
    }

    pub fn scroll_delay(&self) -> Duration {
        self.scroll_speed.delay()
    }
}

/// Why pagination for one rating stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    PageLimit,
    EndOfContent,
    Stalled,
    Failed,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StopReason::PageLimit => "page limit reached",
            StopReason::EndOfContent => "end of reviews",
            StopReason::Stalled => "pagination stalled",
            StopReason::Failed => "failed",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub rating: u8,
    pub pages_requested: u32,
    pub pages_retrieved: u32,
    pub reviews: usize,
    pub skipped_entries: usize,
    pub stop_reason: StopReason,
    pub error: Option<String>,
}

impl RatingSummary {
    pub fn new(rating: u8, pages_requested: u32) -> Self {
        Self {
            rating,
            pages_requested,
            pages_retrieved: 0,
            reviews: 0,
            skipped_entries: 0,
            stop_reason: StopReason::PageLimit,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrapeSummary {
    pub total_reviews: usize,
    pub ratings: Vec<RatingSummary>,
    pub average_rating: Option<f64>,
    pub earliest: Option<NaiveDateTime>,
    pub latest: Option<NaiveDateTime>,
    pub mismatched_ratings: usize,
    pub unparsed_timestamps: usize,
}

impl ScrapeSummary {
    pub fn build(records: &[ReviewRecord], ratings: Vec<RatingSummary>) -> Self {
        let total_reviews = records.len();
        let average_rating = if records.is_empty() {
            None
        } else {
            let sum: u64 = records.iter().map(|r| r.actual_rating as u64).sum();
            Some(sum as f64 / total_reviews as f64)
        };
        let parsed = records
            .iter()
            .filter_map(|r| r.timestamp.as_ref().and_then(ReviewTimestamp::parsed));
        let (earliest, latest) = parsed.fold((None, None), |(min, max), ts| {
            (
                Some(min.map_or(ts, |m: NaiveDateTime| m.min(ts))),
                Some(max.map_or(ts, |m: NaiveDateTime| m.max(ts))),
            )
        });
        Self {
            total_reviews,
            ratings,
            average_rating,
            earliest,
            latest,
            mismatched_ratings: records.iter().filter(|r| r.rating_mismatch()).count(),
            unparsed_timestamps: records
                .iter()
                .filter(|r| matches!(r.timestamp, Some(ReviewTimestamp::Unparsed(_))))
                .count(),
        }
    }

    pub fn ratings_scraped(&self) -> usize {
        self.ratings.iter().filter(|r| r.reviews > 0).count()
    }
}

/// The dataset handed to the caller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub records: Vec<ReviewRecord>,
    pub summary: ScrapeSummary,
}

impl ScrapeResult {
    pub fn new(records: Vec<ReviewRecord>, ratings: Vec<RatingSummary>) -> Self {
        let summary = ScrapeSummary::build(&records, ratings);
        Self { records, summary }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(filter: u8, actual: u8, day: u32) -> ReviewRecord {
        ReviewRecord {
            rating_filter: filter,
            actual_rating: actual,
            timestamp: Some(ReviewTimestamp::Parsed(
                NaiveDate::from_ymd_opt(2024, 1, day)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap(),
            )),
            comment: String::new(),
            page_number: 1,
            author: None,
            variation: None,
        }
    }

    #[test]
    fn zero_caps_are_dropped() {
        let limits =
            RatingLimits::from_pairs([(1, Some(2)), (2, Some(0)), (3, None), (5, Some(1))])
                .unwrap();
        assert_eq!(limits.requested().collect::<Vec<_>>(), vec![(1, 2), (5, 1)]);
        assert_eq!(limits.total_pages(), 3);
        assert_eq!(limits.get(2), None);
    }

    #[test]
    fn out_of_range_ratings_are_rejected() {
        assert_eq!(
            RatingLimits::new().with(6, 1).unwrap_err(),
            RequestError::RatingOutOfRange(6)
        );
        assert_eq!(
            RatingLimits::new().with(0, 1).unwrap_err(),
            RequestError::RatingOutOfRange(0)
        );
    }

    #[test]
    fn requested_is_ascending_regardless_of_insert_order() {
        let limits = RatingLimits::new()
            .with(5, 1)
            .unwrap()
            .with(1, 2)
            .unwrap()
            .with(3, 4)
            .unwrap();
        let ratings = limits.requested().map(|(r, _)| r).collect::<Vec<_>>();
        assert_eq!(ratings, vec![1, 3, 5]);
    }

    #[test]
    fn parse_entry_handles_whitespace_and_errors() {
        assert_eq!(RatingLimits::parse_entry(" 4 = 3 ").unwrap(), (4, 3));
        assert!(matches!(
            RatingLimits::parse_entry("4:3"),
            Err(RequestError::LimitSyntax(_))
        ));
        assert_eq!(
            RatingLimits::parse_entry("9=1").unwrap_err(),
            RequestError::RatingOutOfRange(9)
        );
    }

    #[test]
    fn limits_deserialize_through_validation() {
        let limits: RatingLimits = serde_json::from_str(r#"{"1": 2, "4": 0}"#).unwrap();
        assert_eq!(limits.requested().collect::<Vec<_>>(), vec![(1, 2)]);
        assert!(serde_json::from_str::<RatingLimits>(r#"{"7": 2}"#).is_err());
    }

    #[test]
    fn scroll_speed_delays() {
        assert_eq!(ScrollSpeed::Fast.delay(), Duration::from_secs(1));
        assert_eq!(ScrollSpeed::Medium.delay(), Duration::from_secs(2));
        assert_eq!(ScrollSpeed::Slow.delay(), Duration::from_secs(3));
        assert_eq!("SLOW".parse::<ScrollSpeed>().unwrap(), ScrollSpeed::Slow);
        assert!("turbo".parse::<ScrollSpeed>().is_err());
    }

    #[test]
    fn summary_statistics() {
        let records = vec![record(1, 1, 3), record(1, 2, 1), record(5, 5, 9)];
        let summary = ScrapeSummary::build(&records, vec![]);
        assert_eq!(summary.total_reviews, 3);
        assert_eq!(summary.mismatched_ratings, 1);
        assert!((summary.average_rating.unwrap() - 8.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.earliest.unwrap().format("%d").to_string(), "01");
        assert_eq!(summary.latest.unwrap().format("%d").to_string(), "09");
    }
}

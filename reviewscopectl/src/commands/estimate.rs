use clap::Args;
use serde::Serialize;

use reviewscope_core::reviews::RatingLimits;

use crate::{parse_limit_arg, DisplayFallback};

const SECONDS_PER_PAGE: u64 = 30;

#[derive(Args, Debug, Clone)]
pub struct EstimateArgs {
    /// Page cap per rating, e.g. `--limit 5=3`; repeatable
    #[arg(long = "limit", value_name = "RATING=PAGES", value_parser = parse_limit_arg)]
    pub limits: Vec<(u8, u32)>,
}

#[derive(Debug, Serialize)]
pub struct EstimateReport {
    pub ratings: Vec<u8>,
    pub total_pages: u32,
    pub estimated_seconds: u64,
}

impl EstimateReport {
    pub fn build(limits: &RatingLimits) -> Self {
        let total_pages = limits.total_pages();
        Self {
            ratings: limits.requested().map(|(rating, _)| rating).collect(),
            total_pages,
            estimated_seconds: total_pages as u64 * SECONDS_PER_PAGE,
        }
    }
}

impl DisplayFallback for EstimateReport {
    fn display(&self) -> String {
        if self.total_pages == 0 {
            return "nothing to scrape: every rating limit is zero".to_string();
        }
        let ratings = self
            .ratings
            .iter()
            .map(|rating| format!("{rating}★"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "ratings: {ratings}\npages: {}\nestimated time: {}m {}s",
            self.total_pages,
            self.estimated_seconds / 60,
            self.estimated_seconds % 60
        )
    }
}

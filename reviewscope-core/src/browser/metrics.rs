use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeMetrics {
    pub pages_opened: u64,
    pub filters_selected: u64,
    pub page_advances: u64,
    pub stalls: u64,
    pub entries_extracted: u64,
    pub entries_skipped: u64,
}

impl ScrapeMetrics {
    pub fn record_page_open(&mut self) {
        self.pages_opened = self.pages_opened.saturating_add(1);
    }

    pub fn record_filter_selected(&mut self) {
        self.filters_selected = self.filters_selected.saturating_add(1);
    }

    pub fn record_advances(&mut self, count: u32) {
        self.page_advances = self.page_advances.saturating_add(count as u64);
    }

    pub fn record_stalls(&mut self, count: u32) {
        self.stalls = self.stalls.saturating_add(count as u64);
    }

    pub fn record_extraction(&mut self, extracted: usize, skipped: usize) {
        self.entries_extracted = self.entries_extracted.saturating_add(extracted as u64);
        self.entries_skipped = self.entries_skipped.saturating_add(skipped as u64);
    }
}

use serde::{Deserialize, Serialize};

use crate::mirror::MirrorEndpoint;

/// Counters for one scrape run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeStats {
    pub extraction_passes: u64,
    pub items_seen: u64,
    pub records_parsed: u64,
    pub records_rejected: u64,
    pub unparsed_items: u64,
    pub extraction_failures: u64,
    pub page_errors: u64,
    pub empty_pages: u64,
    pub pages_followed: u64,
    pub rotations: u64,
    pub endpoints_used: Vec<String>,
}

impl ScrapeStats {
    pub fn record_pass(&mut self, items: usize) {
        self.extraction_passes = self.extraction_passes.saturating_add(1);
        self.items_seen = self.items_seen.saturating_add(items as u64);
    }

    pub fn record_parsed(&mut self, accepted: bool) {
        self.records_parsed = self.records_parsed.saturating_add(1);
        if !accepted {
            self.records_rejected = self.records_rejected.saturating_add(1);
        }
    }

    pub fn record_unparsed(&mut self) {
        self.unparsed_items = self.unparsed_items.saturating_add(1);
    }

    pub fn record_extraction_failure(&mut self) {
        self.extraction_failures = self.extraction_failures.saturating_add(1);
    }

    pub fn record_page_error(&mut self) {
        self.page_errors = self.page_errors.saturating_add(1);
    }

    pub fn record_empty_page(&mut self) {
        self.empty_pages = self.empty_pages.saturating_add(1);
    }

    pub fn record_page_followed(&mut self) {
        self.pages_followed = self.pages_followed.saturating_add(1);
    }

    pub fn record_rotation(&mut self) {
        self.rotations = self.rotations.saturating_add(1);
    }

    pub fn record_endpoint(&mut self, endpoint: &MirrorEndpoint) {
        self.endpoints_used.push(endpoint.as_str().to_string());
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.records_parsed == 0 {
            0.0
        } else {
            let accepted = self.records_parsed - self.records_rejected;
            (accepted as f64 / self.records_parsed as f64) * 100.0
        }
    }
}

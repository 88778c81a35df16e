mod orchestrator;
mod stats;

use std::sync::Arc;

use tracing::{error, info};

use crate::browser::{BrowserLauncher, LaunchOverrides};
use crate::clock::{Clock, TokioClock};
use crate::config::ScraperConfig;
use crate::error::ScrapeResult;
use crate::model::{PostRecord, ScrapeRequest};

pub use orchestrator::{ScrapeOrchestrator, ScrapeReport, StopReason};
pub use stats::ScrapeStats;

/// Owns one browser session per call and runs the orchestrator over it.
pub struct TweetScraper {
    config: ScraperConfig,
    launcher: BrowserLauncher,
    headless: bool,
    clock: Arc<dyn Clock>,
}

impl TweetScraper {
    pub fn new(config: ScraperConfig, headless: bool) -> Self {
        let launcher = BrowserLauncher::new(config.browser.clone());
        Self {
            config,
            launcher,
            headless,
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Collected records, or an empty list if the session could not be set up.
    pub async fn scrape(&self, request: &ScrapeRequest) -> Vec<PostRecord> {
        match self.scrape_report(request).await {
            Ok(report) => report.records,
            Err(err) => {
                error!(error = %err, "Scraping failed");
                Vec::new()
            }
        }
    }

    pub async fn scrape_query(&self, query: &str, limit: usize, verbose: bool) -> Vec<PostRecord> {
        match ScrapeRequest::new(query, limit, verbose) {
            Ok(request) => self.scrape(&request).await,
            Err(err) => {
                error!(error = %err, "Scraping failed");
                Vec::new()
            }
        }
    }

    /// Fails only when the browser session cannot be acquired.
    pub async fn scrape_report(&self, request: &ScrapeRequest) -> ScrapeResult<ScrapeReport> {
        let mut session = self
            .launcher
            .acquire(LaunchOverrides {
                headless: Some(self.headless),
            })
            .await?;

        let mut orchestrator = ScrapeOrchestrator::new(&self.config, Arc::clone(&self.clock));
        let report = orchestrator.run(&mut session, request).await;
        session.release().await;

        info!(
            collected = report.records.len(),
            reason = %report.stop_reason,
            "Browser session closed"
        );
        Ok(report)
    }
}

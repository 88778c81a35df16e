use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use nitter_core::{
    BrowserError, BrowserResult, HumanPacer, ManualClock, MirrorSession, PacingSection,
    ScrapeOrchestrator, ScrapeReport, ScrapeRequest, ScraperConfig, StopReason, TweetScraper,
};

#[derive(Clone)]
enum Item {
    Post(String),
    Broken,
}

fn post(author: &str, id: usize, text: &str, date_title: &str) -> Item {
    Item::Post(format!(
        r#"<a class="tweet-link" href="/{author}/status/{id}#m"></a>
<div class="tweet-body">
  <div class="tweet-header">
    <a class="fullname" href="/{author}">{author} account</a>
    <a class="username" href="/{author}">@{author}</a>
    <span class="tweet-date"><a href="/{author}/status/{id}#m" title="{date_title}">1h</a></span>
  </div>
  <div class="tweet-content media-body" dir="auto">{text}</div>
  <div class="tweet-stats">
    <span class="tweet-stat"><div class="icon-container"><span class="icon-heart"></span> {id}</div></span>
  </div>
</div>"#
    ))
}

fn numbered(id: usize) -> Item {
    post(
        "ferris",
        id,
        &format!("post number {id} about #rust"),
        "Apr 5, 2025 · 3:00 PM UTC",
    )
}

fn three_per_page(page: usize) -> Vec<Item> {
    (0..3).map(|i| numbered(page * 3 + i)).collect()
}

fn two_per_page(page: usize) -> Vec<Item> {
    (0..2).map(|i| numbered(page * 2 + i)).collect()
}

fn all_broken(_page: usize) -> Vec<Item> {
    vec![Item::Broken; 8]
}

/// Scripted mirror: probe pages always show `probe_items` containers, search
/// pages serve `page_items(n)` for the n-th page reached by clicking show-more.
struct FakeMirror {
    probe_items: usize,
    page_items: fn(usize) -> Vec<Item>,
    page_limit: Option<usize>,
    failing_searches: usize,
    empty_collects: usize,
    collect_failures_after: Option<usize>,
    on_search_page: bool,
    page: usize,
    items: Vec<Item>,
    collects: usize,
    visits: Vec<String>,
    reads: usize,
    clicks: usize,
    bottoms: usize,
}

impl FakeMirror {
    fn new(page_items: fn(usize) -> Vec<Item>) -> Self {
        Self {
            probe_items: 10,
            page_items,
            page_limit: None,
            failing_searches: 0,
            empty_collects: 0,
            collect_failures_after: None,
            on_search_page: false,
            page: 0,
            items: Vec::new(),
            collects: 0,
            visits: Vec::new(),
            reads: 0,
            clicks: 0,
            bottoms: 0,
        }
    }

    fn searches(&self) -> usize {
        self.visits
            .iter()
            .filter(|url| url.contains("/search?f=tweets"))
            .count()
    }
}

#[async_trait(?Send)]
impl MirrorSession for FakeMirror {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        self.visits.push(url.to_string());
        self.items.clear();
        if url.contains("/search?f=tweets") {
            if self.failing_searches > 0 {
                self.failing_searches -= 1;
                self.on_search_page = false;
                return Err(BrowserError::Timeout(format!("navigation to {url}")));
            }
            self.on_search_page = true;
            self.page = 0;
        } else {
            self.on_search_page = false;
        }
        Ok(())
    }

    async fn count(&mut self, _selector: &str) -> BrowserResult<usize> {
        Ok(self.probe_items)
    }

    async fn collect_items(&mut self, _selector: &str) -> BrowserResult<usize> {
        self.collects += 1;
        if let Some(limit) = self.collect_failures_after {
            if self.collects > limit {
                return Err(BrowserError::Unexpected("target closed".into()));
            }
        }
        if self.empty_collects > 0 {
            self.empty_collects -= 1;
            self.items.clear();
            return Ok(0);
        }
        self.items = if self.on_search_page {
            (self.page_items)(self.page)
        } else {
            Vec::new()
        };
        Ok(self.items.len())
    }

    async fn item_html(&mut self, index: usize) -> BrowserResult<String> {
        self.reads += 1;
        match self.items.get(index) {
            Some(Item::Post(markup)) => Ok(markup.clone()),
            Some(Item::Broken) => Err(BrowserError::Unexpected("stale element".into())),
            None => Err(BrowserError::Unexpected(format!("no item {index}"))),
        }
    }

    async fn viewport_height(&mut self) -> BrowserResult<u32> {
        Ok(1000)
    }

    async fn scroll_by(&mut self, _delta_y: u32) -> BrowserResult<()> {
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> BrowserResult<()> {
        self.bottoms += 1;
        Ok(())
    }

    async fn is_visible(&mut self, _selector: &str) -> BrowserResult<bool> {
        Ok(self.on_search_page && self.page_limit.map_or(true, |pages| self.page + 1 < pages))
    }

    async fn click_and_wait(&mut self, _selector: &str, _timeout: Duration) -> BrowserResult<()> {
        self.clicks += 1;
        self.page += 1;
        self.items.clear();
        Ok(())
    }
}

fn test_config() -> ScraperConfig {
    let mut config = ScraperConfig::default();
    config.mirrors.instances = vec![
        "https://alpha.example".into(),
        "https://beta.example".into(),
        "https://gamma.example".into(),
    ];
    config.mirrors.probe_settle_ms = [0, 0];
    config.pacing = PacingSection::instant();
    config
}

async fn run(session: &mut FakeMirror, clock: Arc<ManualClock>, limit: usize) -> ScrapeReport {
    let config = test_config();
    let pacer = HumanPacer::with_seed(config.pacing.clone(), clock, 17);
    let mut orchestrator = ScrapeOrchestrator::with_pacer(&config, pacer);
    let request = ScrapeRequest::new("rust", limit, false).unwrap();
    orchestrator.run(session, &request).await
}

fn links(report: &ScrapeReport) -> Vec<String> {
    report
        .records
        .iter()
        .filter_map(|record| record.link.clone())
        .collect()
}

#[tokio::test]
async fn limit_is_reached_on_second_pass_in_discovery_order() {
    let clock = Arc::new(ManualClock::default());
    let mut session = FakeMirror::new(three_per_page);

    let report = run(&mut session, clock.clone(), 5).await;

    assert_eq!(report.stop_reason, StopReason::LimitReached);
    assert_eq!(report.records.len(), 5);
    let expected: Vec<String> = (0..5)
        .map(|id| format!("https://twitter.com/ferris/status/{id}#m"))
        .collect();
    assert_eq!(links(&report), expected);
    assert_eq!(report.stats.extraction_passes, 2);
    assert_eq!(report.stats.pages_followed, 1);
    assert_eq!(session.clicks, 1);
    assert_eq!(session.reads, 5);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn consecutive_read_failures_stop_the_run() {
    let clock = Arc::new(ManualClock::default());
    let mut session = FakeMirror::new(all_broken);

    let report = run(&mut session, clock, 20).await;

    assert_eq!(report.stop_reason, StopReason::TooManyConsecutiveFailures);
    assert!(report.records.is_empty());
    assert_eq!(session.reads, 6);
    assert_eq!(report.stats.extraction_failures, 6);
    assert_eq!(session.clicks, 0);
}

#[tokio::test]
async fn page_error_cools_down_and_rotates() {
    let clock = Arc::new(ManualClock::default());
    let mut session = FakeMirror::new(three_per_page);
    session.failing_searches = 1;
    session.page_limit = Some(1);

    let report = run(&mut session, clock.clone(), 10).await;

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.records.len(), 3);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(10)]);
    assert_eq!(report.stats.page_errors, 1);
    assert_eq!(report.stats.rotations, 1);
    assert_eq!(report.stats.endpoints_used.len(), 2);
    assert_eq!(session.searches(), 2);
}

#[tokio::test]
async fn partial_results_survive_retry_exhaustion() {
    let clock = Arc::new(ManualClock::default());
    let mut session = FakeMirror::new(two_per_page);
    session.collect_failures_after = Some(1);

    let report = run(&mut session, clock.clone(), 10).await;

    assert_eq!(report.stop_reason, StopReason::RetriesExhausted);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.stats.page_errors, 3);
    assert_eq!(report.stats.rotations, 2);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(10); 2]);
}

#[tokio::test]
async fn empty_page_rotates_without_cooldown() {
    let clock = Arc::new(ManualClock::default());
    let mut session = FakeMirror::new(three_per_page);
    session.empty_collects = 1;
    session.page_limit = Some(1);

    let report = run(&mut session, clock.clone(), 10).await;

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.stats.empty_pages, 1);
    assert_eq!(report.stats.rotations, 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn missing_show_more_exhausts_after_scrolling() {
    let clock = Arc::new(ManualClock::default());
    let mut session = FakeMirror::new(three_per_page);
    session.page_limit = Some(1);

    let report = run(&mut session, clock, 10).await;

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.records.len(), 3);
    assert_eq!(session.clicks, 0);
    // one from the browsing simulation, one from the pagination check
    assert_eq!(session.bottoms, 2);
}

#[tokio::test]
async fn no_working_mirror_returns_empty_report() {
    let clock = Arc::new(ManualClock::default());
    let mut session = FakeMirror::new(three_per_page);
    session.probe_items = 0;

    let report = run(&mut session, clock.clone(), 10).await;

    assert_eq!(report.stop_reason, StopReason::NoWorkingEndpoint);
    assert!(report.records.is_empty());
    assert_eq!(session.searches(), 0);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(7); 2]);
}

fn mixed_page(_page: usize) -> Vec<Item> {
    vec![
        numbered(1),
        post("ferris", 2, "short", "Apr 5, 2025 · 3:00 PM UTC"),
        Item::Post(r#"<div class="show-more"><a href="?cursor=x">Load more</a></div>"#.into()),
        post("crab", 4, "relative dates resolve against the run clock", "2h"),
    ]
}

#[tokio::test]
async fn invalid_items_are_skipped_and_relative_dates_use_clock() {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let mut session = FakeMirror::new(mixed_page);
    session.page_limit = Some(1);

    let report = run(&mut session, clock, 10).await;

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.stats.records_rejected, 1);
    assert_eq!(report.stats.unparsed_items, 1);
    let relative = &report.records[1];
    assert_eq!(relative.user.username, "crab");
    assert_eq!(
        relative.timestamp,
        Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap())
    );
    assert_eq!(report.records[0].hashtags, vec!["rust"]);
    assert_eq!(report.records[0].stats.likes, 1);
}

#[tokio::test]
async fn browser_setup_failure_yields_empty_result() {
    let mut config = test_config();
    config.browser.executable_path = Some("/nonexistent/chromium-for-tests".into());
    let clock = Arc::new(ManualClock::default());
    let scraper = TweetScraper::new(config, true).with_clock(clock.clone());
    assert_eq!(
        scraper.config().browser.executable_path.as_deref(),
        Some("/nonexistent/chromium-for-tests")
    );
    let request = ScrapeRequest::new("rust", 5, false).unwrap();

    assert!(scraper.scrape(&request).await.is_empty());
    assert!(scraper.scrape_report(&request).await.is_err());
    assert!(scraper.scrape_query("  ", 5, false).await.is_empty());
    assert!(clock.sleeps().is_empty());
}

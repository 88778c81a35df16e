use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::browser::{BrowserError, BrowserResult, HumanPacer, MirrorSession};
use crate::clock::Clock;
use crate::config::{ScrapeSection, ScraperConfig, SelectorSection};
use crate::mirror::{MirrorEndpoint, MirrorProber};
use crate::model::{PostRecord, ScrapeRequest};
use crate::parser::TweetParser;
use crate::validator::RecordValidator;

use super::stats::ScrapeStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    LimitReached,
    Exhausted,
    RetriesExhausted,
    TooManyConsecutiveFailures,
    NoWorkingEndpoint,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StopReason::LimitReached => "limit reached",
            StopReason::Exhausted => "no more results",
            StopReason::RetriesExhausted => "retry budget exhausted",
            StopReason::TooManyConsecutiveFailures => "too many consecutive extraction failures",
            StopReason::NoWorkingEndpoint => "no working mirror",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeReport {
    pub records: Vec<PostRecord>,
    pub stop_reason: StopReason,
    pub stats: ScrapeStats,
}

#[derive(Debug)]
enum State {
    SelectingEndpoint,
    RotatingEndpoint,
    Searching(MirrorEndpoint),
    ExtractingPage(MirrorEndpoint),
    Paginating(MirrorEndpoint),
    Done(StopReason),
}

#[derive(Debug, Default)]
struct Progress {
    records: Vec<PostRecord>,
    stats: ScrapeStats,
    retries: usize,
    consecutive_failures: usize,
}

/// Drives search, extraction and pagination over one browsing session.
pub struct ScrapeOrchestrator {
    prober: MirrorProber,
    parser: TweetParser,
    validator: RecordValidator,
    pacer: HumanPacer,
    settings: ScrapeSection,
    selectors: SelectorSection,
}

impl ScrapeOrchestrator {
    pub fn new(config: &ScraperConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_pacer(config, HumanPacer::new(config.pacing.clone(), clock))
    }

    pub fn with_pacer(config: &ScraperConfig, pacer: HumanPacer) -> Self {
        Self {
            prober: MirrorProber::new(config.mirrors.clone(), &config.selectors),
            parser: TweetParser::new(&config.source),
            validator: RecordValidator::new(&config.source),
            pacer,
            settings: config.scrape.clone(),
            selectors: config.selectors.clone(),
        }
    }

    /// Never fails: whatever was collected before a stop condition is
    /// returned in discovery order, with the reason the run ended.
    pub async fn run(
        &mut self,
        session: &mut dyn MirrorSession,
        request: &ScrapeRequest,
    ) -> ScrapeReport {
        let span = info_span!("scrape", query = %request.query(), limit = request.limit());
        self.drive(session, request).instrument(span).await
    }

    async fn drive(&mut self, session: &mut dyn MirrorSession, request: &ScrapeRequest) -> ScrapeReport {
        let mut progress = Progress::default();
        let mut state = State::SelectingEndpoint;

        let stop_reason = loop {
            state = match state {
                State::SelectingEndpoint => self.select(session, &mut progress).await,
                State::RotatingEndpoint => {
                    progress.stats.record_rotation();
                    info!(retries = progress.retries, "Rotating mirror");
                    self.select(session, &mut progress).await
                }
                State::Searching(endpoint) => {
                    let url = endpoint.search_url(request.query());
                    debug!(url = %url, "Issuing search");
                    match session.goto(&url, self.settings.navigation_timeout()).await {
                        Ok(()) => State::ExtractingPage(endpoint),
                        Err(err) => self.page_error(&mut progress, err).await,
                    }
                }
                State::ExtractingPage(endpoint) => {
                    self.extract_page(session, request, &mut progress, endpoint)
                        .await
                }
                State::Paginating(endpoint) => {
                    if self.paginate(session).await {
                        progress.stats.record_page_followed();
                        progress.retries = 0;
                        progress.consecutive_failures = 0;
                        State::ExtractingPage(endpoint)
                    } else {
                        info!("Reached end of results");
                        State::Done(StopReason::Exhausted)
                    }
                }
                State::Done(reason) => break reason,
            };
        };

        progress.records.truncate(request.limit());
        info!(
            collected = progress.records.len(),
            limit = request.limit(),
            reason = %stop_reason,
            passes = progress.stats.extraction_passes,
            "Scrape finished"
        );
        ScrapeReport {
            records: progress.records,
            stop_reason,
            stats: progress.stats,
        }
    }

    async fn select(&mut self, session: &mut dyn MirrorSession, progress: &mut Progress) -> State {
        match self.prober.select_endpoint(session, &mut self.pacer).await {
            Ok(endpoint) => {
                progress.stats.record_endpoint(&endpoint);
                State::Searching(endpoint)
            }
            Err(err) => {
                error!(error = %err, "Unable to find a working mirror");
                State::Done(StopReason::NoWorkingEndpoint)
            }
        }
    }

    async fn page_error(&mut self, progress: &mut Progress, err: BrowserError) -> State {
        progress.stats.record_page_error();
        progress.retries += 1;
        warn!(
            error = %err,
            timeout = err.is_timeout(),
            retries = progress.retries,
            max_retries = self.settings.max_retries,
            "Page error"
        );
        if progress.retries >= self.settings.max_retries {
            return State::Done(StopReason::RetriesExhausted);
        }
        self.pacer.wait(self.settings.page_error_cooldown()).await;
        State::RotatingEndpoint
    }

    async fn extract_page(
        &mut self,
        session: &mut dyn MirrorSession,
        request: &ScrapeRequest,
        progress: &mut Progress,
        endpoint: MirrorEndpoint,
    ) -> State {
        if progress.records.len() >= request.limit() {
            return State::Done(StopReason::LimitReached);
        }
        if progress.retries >= self.settings.max_retries {
            return State::Done(StopReason::RetriesExhausted);
        }

        self.pacer.simulate_browsing(session, request.verbose()).await;

        let available = match session.collect_items(&self.selectors.timeline_item).await {
            Ok(count) => count,
            Err(err) => return self.page_error(progress, err).await,
        };
        progress.stats.record_pass(available);

        if available == 0 {
            progress.stats.record_empty_page();
            progress.retries += 1;
            warn!(endpoint = %endpoint, retries = progress.retries, "No timeline items found");
            if progress.retries >= self.settings.max_retries {
                return State::Done(StopReason::RetriesExhausted);
            }
            return State::RotatingEndpoint;
        }

        for index in 0..available {
            if progress.records.len() >= request.limit() {
                break;
            }
            let markup = match session.item_html(index).await {
                Ok(markup) => markup,
                Err(err) => {
                    progress.stats.record_extraction_failure();
                    progress.consecutive_failures += 1;
                    warn!(
                        index,
                        error = %err,
                        consecutive = progress.consecutive_failures,
                        "Failed to read timeline item"
                    );
                    if progress.consecutive_failures > self.settings.max_consecutive_failures {
                        error!(
                            failures = progress.consecutive_failures,
                            "Too many consecutive extraction failures"
                        );
                        return State::Done(StopReason::TooManyConsecutiveFailures);
                    }
                    continue;
                }
            };
            progress.consecutive_failures = 0;
            self.accept(request, progress, &markup);
        }

        if progress.records.len() >= request.limit() {
            State::Done(StopReason::LimitReached)
        } else {
            State::Paginating(endpoint)
        }
    }

    fn accept(&self, request: &ScrapeRequest, progress: &mut Progress, markup: &str) {
        let now = self.pacer.clock().now();
        let Some(record) = self.parser.parse_at(markup, now) else {
            progress.stats.record_unparsed();
            return;
        };
        match self.validator.check(&record) {
            Ok(()) => {
                progress.stats.record_parsed(true);
                progress.records.push(record);
                let collected = progress.records.len();
                if request.verbose() {
                    info!(collected, limit = request.limit(), "Collected post");
                } else {
                    debug!(collected, limit = request.limit(), "Collected post");
                }
            }
            Err(rejection) => {
                progress.stats.record_parsed(false);
                debug!(reason = %rejection, link = ?record.link, "Rejected post");
            }
        }
    }

    /// Follows the show-more affordance, scrolling once to reveal it if
    /// needed. `false` means there is nothing further to load.
    async fn paginate(&mut self, session: &mut dyn MirrorSession) -> bool {
        match self.try_paginate(session).await {
            Ok(more) => more,
            Err(err) => {
                warn!(error = %err, "Pagination failed");
                false
            }
        }
    }

    async fn try_paginate(&mut self, session: &mut dyn MirrorSession) -> BrowserResult<bool> {
        if session.is_visible(&self.selectors.show_more).await? {
            self.follow_show_more(session).await?;
            return Ok(true);
        }

        session.scroll_to_bottom().await?;
        let lazy_wait = Duration::from_millis(self.pacer.config().lazy_load_wait_ms);
        self.pacer.wait(lazy_wait).await;

        if session.is_visible(&self.selectors.show_more).await? {
            self.follow_show_more(session).await?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn follow_show_more(&mut self, session: &mut dyn MirrorSession) -> BrowserResult<()> {
        session
            .click_and_wait(&self.selectors.show_more_link, self.settings.pagination_timeout())
            .await?;
        let settle = self.pacer.config().pagination_settle_ms;
        self.pacer.pause(settle).await;
        Ok(())
    }
}

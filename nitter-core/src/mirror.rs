use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::browser::{BrowserError, HumanPacer, MirrorSession};
use crate::config::{MirrorSection, SelectorSection};
use crate::error::{ScrapeError, ScrapeResult};

/// Base URL of one mirror instance, without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MirrorEndpoint(String);

impl MirrorEndpoint {
    pub fn new(base: impl Into<String>) -> Self {
        Self(base.into().trim().trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn search_url(&self, query: &str) -> String {
        format!("{}/search?f=tweets&q={}", self.0, encode(query))
    }

    pub fn probe_url(&self, term: &str) -> String {
        format!("{}/search?q={}", self.0, encode(term))
    }
}

impl fmt::Display for MirrorEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[derive(Debug, Error)]
pub enum ProbeFailure {
    #[error("probe navigation failed: {0}")]
    Navigation(#[from] BrowserError),
    #[error("found {found} timeline items, need {required}")]
    InsufficientItems { found: usize, required: usize },
}

/// Picks a mirror that currently serves usable search results.
#[derive(Debug, Clone)]
pub struct MirrorProber {
    candidates: Vec<MirrorEndpoint>,
    config: MirrorSection,
    timeline_item: String,
}

impl MirrorProber {
    pub fn new(config: MirrorSection, selectors: &SelectorSection) -> Self {
        let candidates = config
            .instances
            .iter()
            .map(|base| MirrorEndpoint::new(base.as_str()))
            .filter(|endpoint| !endpoint.as_str().is_empty())
            .collect();
        Self {
            candidates,
            config,
            timeline_item: selectors.timeline_item.clone(),
        }
    }

    pub fn candidates(&self) -> &[MirrorEndpoint] {
        &self.candidates
    }

    /// Probes the shuffled candidates pass by pass. Leaves the session on the
    /// probe page of the endpoint it returns.
    pub async fn select_endpoint(
        &self,
        session: &mut dyn MirrorSession,
        pacer: &mut HumanPacer,
    ) -> ScrapeResult<MirrorEndpoint> {
        if self.candidates.is_empty() {
            warn!("No mirror candidates configured");
            return Err(ScrapeError::NoWorkingEndpoint { passes: 0 });
        }

        let passes = self.config.max_passes.max(1);
        for pass in 1..=passes {
            let mut order = self.candidates.clone();
            pacer.shuffle(&mut order);
            debug!(pass, candidates = order.len(), "Starting probe pass");

            for endpoint in order {
                match self.probe(&endpoint, session, pacer).await {
                    Ok(found) => {
                        info!(endpoint = %endpoint, items = found, "Selected working mirror");
                        return Ok(endpoint);
                    }
                    Err(failure) => {
                        warn!(endpoint = %endpoint, error = %failure, "Mirror probe failed");
                    }
                }
            }

            if pass < passes {
                warn!(
                    pass,
                    cooldown_secs = self.config.pass_cooldown_seconds,
                    "No working mirror this pass, cooling down"
                );
                pacer.wait(self.config.pass_cooldown()).await;
            }
        }

        Err(ScrapeError::NoWorkingEndpoint { passes })
    }

    async fn probe(
        &self,
        endpoint: &MirrorEndpoint,
        session: &mut dyn MirrorSession,
        pacer: &mut HumanPacer,
    ) -> Result<usize, ProbeFailure> {
        let url = endpoint.probe_url(&self.config.probe_term);
        debug!(url = %url, "Probing mirror");
        session.goto(&url, self.config.probe_timeout()).await?;
        pacer.pause(self.config.probe_settle_ms).await;
        let found = session.count(&self.timeline_item).await?;
        if found >= self.config.probe_min_items {
            Ok(found)
        } else {
            Err(ProbeFailure::InsufficientItems {
                found,
                required: self.config.probe_min_items,
            })
        }
    }
}

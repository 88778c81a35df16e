use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

pub const DEFAULT_MIRRORS: &[&str] = &[
    "https://nitter.net",
    "https://nitter.poast.org",
    "https://nitter.privacydev.net",
    "https://nitter.lucabased.xyz",
    "https://xcancel.com",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ScraperConfig {
    pub browser: BrowserSection,
    pub mirrors: MirrorSection,
    pub pacing: PacingSection,
    pub scrape: ScrapeSection,
    pub selectors: SelectorSection,
    pub source: SourceSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub user_agent: String,
    pub viewport: [u32; 2],
    pub locale: String,
    pub args: Vec<String>,
    pub request_timeout_seconds: Option<u64>,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport: [1920, 1080],
            locale: "en-US".to_string(),
            args: vec!["--disable-blink-features=AutomationControlled".to_string()],
            request_timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MirrorSection {
    pub instances: Vec<String>,
    pub probe_term: String,
    pub probe_min_items: usize,
    pub probe_timeout_seconds: u64,
    pub probe_settle_ms: [u64; 2],
    pub max_passes: usize,
    pub pass_cooldown_seconds: u64,
}

impl MirrorSection {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    pub fn pass_cooldown(&self) -> Duration {
        Duration::from_secs(self.pass_cooldown_seconds)
    }
}

impl Default for MirrorSection {
    fn default() -> Self {
        Self {
            instances: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            probe_term: "test".to_string(),
            probe_min_items: 3,
            probe_timeout_seconds: 30,
            probe_settle_ms: [1000, 3000],
            max_passes: 3,
            pass_cooldown_seconds: 7,
        }
    }
}

/// Millisecond ranges used to emulate a person reading the timeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingSection {
    pub initial_delay_ms: [u64; 2],
    pub scroll_count: [u32; 2],
    pub scroll_fraction: [f64; 2],
    pub scroll_duration_ms: [u64; 2],
    pub scroll_pause_ms: [u64; 2],
    pub bottom_settle_ms: u64,
    pub lazy_load_wait_ms: u64,
    pub pagination_settle_ms: [u64; 2],
}

impl Default for PacingSection {
    fn default() -> Self {
        Self {
            initial_delay_ms: [1000, 3000],
            scroll_count: [3, 6],
            scroll_fraction: [0.3, 0.8],
            scroll_duration_ms: [500, 2000],
            scroll_pause_ms: [500, 1500],
            bottom_settle_ms: 1000,
            lazy_load_wait_ms: 2000,
            pagination_settle_ms: [1000, 2000],
        }
    }
}

impl PacingSection {
    /// Zeroes every delay; scroll counts and fractions are kept.
    pub fn instant() -> Self {
        Self {
            initial_delay_ms: [0, 0],
            scroll_duration_ms: [0, 0],
            scroll_pause_ms: [0, 0],
            bottom_settle_ms: 0,
            lazy_load_wait_ms: 0,
            pagination_settle_ms: [0, 0],
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeSection {
    pub max_retries: usize,
    pub max_consecutive_failures: usize,
    pub page_error_cooldown_seconds: u64,
    pub navigation_timeout_seconds: u64,
    pub pagination_timeout_seconds: u64,
}

impl ScrapeSection {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_seconds)
    }

    pub fn pagination_timeout(&self) -> Duration {
        Duration::from_secs(self.pagination_timeout_seconds)
    }

    pub fn page_error_cooldown(&self) -> Duration {
        Duration::from_secs(self.page_error_cooldown_seconds)
    }
}

impl Default for ScrapeSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_consecutive_failures: 5,
            page_error_cooldown_seconds: 10,
            navigation_timeout_seconds: 60,
            pagination_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorSection {
    pub timeline_item: String,
    pub show_more: String,
    pub show_more_link: String,
}

impl Default for SelectorSection {
    fn default() -> Self {
        Self {
            timeline_item: "div.timeline-item".to_string(),
            show_more: "div.show-more".to_string(),
            show_more_link: "div.show-more a".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    pub post_domain: String,
    pub media_host: String,
    pub min_content_chars: usize,
}

impl SourceSection {
    pub fn post_prefix(&self) -> String {
        format!("{}/", self.post_domain.trim_end_matches('/'))
    }
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            post_domain: "https://twitter.com".to_string(),
            media_host: "https://pbs.twimg.com".to_string(),
            min_content_chars: 10,
        }
    }
}

pub fn load_scraper_config<P: AsRef<Path>>(path: P) -> Result<ScraperConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

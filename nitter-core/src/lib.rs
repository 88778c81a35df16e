pub mod browser;
pub mod clock;
pub mod config;
pub mod error;
pub mod mirror;
pub mod model;
pub mod parser;
pub mod scrape;
pub mod validator;

pub use browser::{
    BrowserError, BrowserLauncher, BrowserResult, BrowserSession, HumanPacer, LaunchOverrides,
    MirrorSession,
};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{
    load_scraper_config, BrowserSection, MirrorSection, PacingSection, ScrapeSection,
    ScraperConfig, SelectorSection, SourceSection,
};
pub use error::{ConfigError, Result, ScrapeError, ScrapeResult};
pub use mirror::{MirrorEndpoint, MirrorProber, ProbeFailure};
pub use model::{
    MediaAttachments, PostRecord, PostStats, ScrapeRequest, StatKind, UserProfile,
};
pub use parser::{DocumentQuery, HtmlFragment, ParseError, TweetParser};
pub use scrape::{ScrapeOrchestrator, ScrapeReport, ScrapeStats, StopReason, TweetScraper};
pub use validator::{RecordValidator, Rejection};

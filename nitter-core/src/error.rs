use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::browser::BrowserError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid scrape request: {0}")]
    InvalidRequest(String),
    #[error("no working mirror after {passes} probe passes")]
    NoWorkingEndpoint { passes: usize },
    #[error("too many consecutive extraction failures ({failures})")]
    TooManyConsecutiveFailures { failures: usize },
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

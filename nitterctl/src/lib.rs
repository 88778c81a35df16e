use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use nitter_core::{
    load_scraper_config, PostRecord, ScrapeReport, ScrapeRequest, ScrapeStats, ScraperConfig,
    StatKind, StopReason, TweetScraper,
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] nitter_core::ConfigError),
    #[error("scrape error: {0}")]
    Scrape(#[from] nitter_core::ScrapeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Collect posts for a search query from Nitter mirrors", long_about = None)]
pub struct Cli {
    /// Search query
    pub query: String,
    /// Maximum number of posts to collect
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,
    /// Write the collected posts to this file as a JSON array
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Show the browser window instead of running headless
    #[arg(long)]
    pub visible: bool,
    /// Log scrape progress
    #[arg(short, long)]
    pub verbose: bool,
    /// Path to scraper.toml; built-in defaults when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Console output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let request = ScrapeRequest::new(cli.query.as_str(), cli.limit, cli.verbose)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let scraper = TweetScraper::new(config, !cli.visible);
    let report = runtime.block_on(scraper.scrape_report(&request))?;

    if let Some(path) = &cli.output {
        write_records(path, &report.records)?;
        info!(path = %path.display(), records = report.records.len(), "Saved posts");
    }

    let summary = ScrapeSummary::new(&request, report, cli.output.clone());
    render(&summary, cli.format)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // a second initialisation (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<ScraperConfig> {
    match path {
        Some(path) => Ok(load_scraper_config(path)?),
        None => Ok(ScraperConfig::default()),
    }
}

/// Pretty-printed JSON array, non-ASCII text written as-is.
pub fn write_records(path: &Path, records: &[PostRecord]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
pub struct ScrapeSummary {
    pub query: String,
    pub limit: usize,
    pub collected: usize,
    pub stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub stats: ScrapeStats,
    pub records: Vec<PostRecord>,
}

impl ScrapeSummary {
    fn new(request: &ScrapeRequest, report: ScrapeReport, output: Option<PathBuf>) -> Self {
        Self {
            query: request.query().to_string(),
            limit: request.limit(),
            collected: report.records.len(),
            stop_reason: report.stop_reason,
            output,
            stats: report.stats,
            records: report.records,
        }
    }
}

impl DisplayFallback for ScrapeSummary {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Query \"{}\": {}/{} posts ({})",
            self.query, self.collected, self.limit, self.stop_reason
        )];
        lines.push(format!(
            "Passes: {} · pages followed: {} · rotations: {} · accepted: {:.1}%",
            self.stats.extraction_passes,
            self.stats.pages_followed,
            self.stats.rotations,
            self.stats.acceptance_rate()
        ));
        for (index, record) in self.records.iter().enumerate() {
            lines.push(String::new());
            lines.extend(record_lines(index + 1, record));
        }
        if let Some(path) = &self.output {
            lines.push(format!("Saved to {}", path.display()));
        }
        lines.join("\n")
    }
}

fn record_lines(position: usize, record: &PostRecord) -> Vec<String> {
    let badge = if record.user.verified { " ✓" } else { "" };
    let mut header = format!(
        "{:>3}. {} (@{}){}",
        position, record.user.fullname, record.user.username, badge
    );
    if let Some(retweeter) = &record.retweeter {
        header.push_str(&format!(" [RT by @{retweeter}]"));
    } else if record.is_retweet {
        header.push_str(" [RT]");
    }
    let when = record
        .timestamp
        .map(|ts| ts.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string());
    let counts = StatKind::ALL
        .iter()
        .map(|kind| format!("{} {}", record.stats.get(*kind), kind.label()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut lines = vec![
        header,
        format!("     {}", record.content),
        format!("     {when} · {counts}"),
    ];
    let media = &record.media;
    if !media.is_empty() {
        lines.push(format!(
            "     media: {} images, {} videos, {} gifs",
            media.images.len(),
            media.videos.len(),
            media.gifs.len()
        ));
    }
    if let Some(link) = &record.link {
        lines.push(format!("     {link}"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use nitter_core::{MediaAttachments, PostStats, UserProfile};
    use tempfile::TempDir;

    fn sample_record() -> PostRecord {
        PostRecord {
            user: UserProfile {
                username: "ferris".into(),
                fullname: "Ferris the Crab".into(),
                verified: true,
            },
            content: "Olá, crustáceos! Rust 🦀 everywhere".into(),
            hashtags: vec!["rust".into()],
            mentions: vec![],
            replying_to: vec![],
            timestamp: Some(Utc.with_ymd_and_hms(2025, 4, 5, 15, 0, 0).unwrap()),
            stats: PostStats {
                comments: 1,
                retweets: 2,
                quotes: 0,
                likes: 42,
            },
            media: MediaAttachments::default(),
            link: Some("https://twitter.com/ferris/status/1#m".into()),
            is_retweet: false,
            retweeter: None,
        }
    }

    fn summary(records: Vec<PostRecord>) -> ScrapeSummary {
        let request = ScrapeRequest::new("rust", 20, false).unwrap();
        let report = ScrapeReport {
            records,
            stop_reason: StopReason::Exhausted,
            stats: ScrapeStats::default(),
        };
        ScrapeSummary::new(&request, report, None)
    }

    #[test]
    fn parses_arguments_with_defaults() {
        let cli = Cli::try_parse_from(["nitterctl", "rust lang"]).unwrap();
        assert_eq!(cli.query, "rust lang");
        assert_eq!(cli.limit, 20);
        assert!(!cli.visible);
        assert!(!cli.verbose);
        assert_eq!(cli.format, OutputFormat::Text);

        let cli = Cli::try_parse_from([
            "nitterctl", "rust", "-l", "5", "-o", "out.json", "--visible", "-v", "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.limit, 5);
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
        assert!(cli.visible && cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);

        assert!(Cli::try_parse_from(["nitterctl"]).is_err());
        assert!(Cli::try_parse_from(["nitterctl", "rust", "--limit", "many"]).is_err());
    }

    #[test]
    fn writes_pretty_unescaped_json_array() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("posts.json");
        write_records(&path, &[sample_record()]).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("crustáceos! Rust 🦀"));
        assert!(written.starts_with("[\n"));

        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        let posts = value.as_array().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["user"]["username"], "ferris");
        assert_eq!(posts[0]["timestamp"], "2025-04-05T15:00:00Z");
        assert_eq!(posts[0]["stats"]["likes"], 42);
        assert_eq!(posts[0]["media"]["images"], serde_json::json!([]));
    }

    #[test]
    fn writing_into_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("posts.json");
        let err = write_records(&path, &[]).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn text_summary_lists_posts() {
        let text = summary(vec![sample_record()]).display();
        assert!(text.starts_with("Query \"rust\": 1/20 posts (no more results)"));
        assert!(text.contains("accepted: 0.0%"));
        assert!(text.contains("1. Ferris the Crab (@ferris) ✓"));
        assert!(text.contains(
            "2025-04-05 15:00 UTC · 1 comments, 2 retweets, 0 quotes, 42 likes"
        ));
        assert!(!text.contains("media:"));
        assert!(text.contains("https://twitter.com/ferris/status/1#m"));
    }

    #[test]
    fn text_summary_shows_media_counts_and_reshares() {
        let mut record = sample_record();
        record.user.verified = false;
        record.is_retweet = true;
        record.retweeter = Some("crab_fan".into());
        record.media = MediaAttachments {
            images: vec!["https://pbs.twimg.com/media/a.jpg".into(); 2],
            videos: vec![],
            gifs: vec!["https://pbs.twimg.com/tweet_video/b.mp4".into()],
        };
        let mut summary = summary(vec![record]);
        summary.stats.extraction_passes = 3;
        summary.stats.records_parsed = 4;
        summary.stats.records_rejected = 1;

        let text = summary.display();
        assert!(text.contains("Passes: 3 · pages followed: 0 · rotations: 0 · accepted: 75.0%"));
        assert!(text.contains("1. Ferris the Crab (@ferris) [RT by @crab_fan]"));
        assert!(!text.contains("✓"));
        assert!(text.contains("media: 2 images, 0 videos, 1 gifs"));
    }

    #[test]
    fn json_summary_names_stop_reason() {
        let value = serde_json::to_value(summary(Vec::new())).unwrap();
        assert_eq!(value["stop_reason"], "exhausted");
        assert_eq!(value["collected"], 0);
        assert!(value.get("output").is_none());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("absent.toml");
        let err = load_config(Some(missing.as_path())).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(load_config(None).is_ok());
    }

    #[test]
    fn blank_query_fails_before_launching_browser() {
        let cli = Cli::try_parse_from(["nitterctl", "   "]).unwrap();
        let err = run(cli).unwrap_err();
        assert!(matches!(
            err,
            AppError::Scrape(nitter_core::ScrapeError::InvalidRequest(_))
        ));
    }
}

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use crate::config::SourceSection;
use crate::model::{PostRecord, PostStats, StatKind};

use super::document::{DocumentQuery, HtmlFragment, ParseResult};
use super::media::MediaParser;
use super::user::UserParser;

const TWEET_BODY: &str = "div.tweet-body";
const RETWEET_HEADER: &str = "div.retweet-header";
const CONTENT: &str = "div.tweet-content";
const CONTENT_DECORATIONS: &str = ".mention, .hashtag, .ellipsis, .hidden, .rt-quote";
const HASHTAG_LINKS: &str = "a[href*='/search?q=%23']";
const MENTION_LINKS: &str = "a.mention";
const REPLYING_TO: &str = "div.replying-to";
const DATE_LINK: &str = "span.tweet-date a";
const STAT: &str = "span.tweet-stat";
const STAT_ICON: &str = "span[class^='icon-']";
const TWEET_LINK: &str = "a.tweet-link";

const ABSOLUTE_DATE_FORMAT: &str = "%b %d, %Y · %I:%M %p UTC";

static RETWEETER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z0-9_]+)\s+retweeted").expect("retweeter regex"));
static HASHTAG_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("hashtag regex"));
static HASHTAG_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%23(\w+)").expect("hashtag href regex"));
static MENTION_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)").expect("mention regex"));
static RELATIVE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([mhd])").expect("relative date regex"));

/// Turns one timeline item's markup into a [`PostRecord`].
#[derive(Debug, Clone)]
pub struct TweetParser {
    users: UserParser,
    media: MediaParser,
    post_domain: String,
}

impl TweetParser {
    pub fn new(source: &SourceSection) -> Self {
        Self {
            users: UserParser::new(),
            media: MediaParser::new(source.media_host.clone()),
            post_domain: source.post_domain.trim_end_matches('/').to_string(),
        }
    }

    pub fn parse(&self, markup: &str) -> Option<PostRecord> {
        self.parse_at(markup, Utc::now())
    }

    /// Relative timestamps (`2h`, `15m`) resolve against `now`.
    pub fn parse_at(&self, markup: &str, now: DateTime<Utc>) -> Option<PostRecord> {
        let fragment = HtmlFragment::parse(markup);
        self.parse_item(&fragment.root(), now)
    }

    pub fn parse_item<D: DocumentQuery>(&self, item: &D, now: DateTime<Utc>) -> Option<PostRecord> {
        match item.exists(TWEET_BODY) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Timeline item has no post body");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "Failed to locate post body");
                return None;
            }
        }

        let content = match clean_content(item) {
            Ok(Some(content)) if !content.is_empty() => content,
            Ok(_) => {
                debug!("Timeline item has no text content");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "Failed to extract content");
                return None;
            }
        };

        let (is_retweet, retweeter) = field("retweet", reshare(item));
        let user = self.users.parse(item);
        let media = self.media.parse(item);

        Some(PostRecord {
            hashtags: field("hashtags", hashtags(item, &content)),
            mentions: field("mentions", mentions(item, &content)),
            replying_to: field("replying_to", replying_to(item)),
            timestamp: field("timestamp", timestamp(item, now)),
            stats: field("stats", stats(item)),
            link: field("link", self.link(item)),
            user,
            content,
            media,
            is_retweet,
            retweeter,
        })
    }

    fn link<D: DocumentQuery>(&self, item: &D) -> ParseResult<Option<String>> {
        Ok(item
            .select_first(TWEET_LINK)?
            .and_then(|anchor| anchor.attribute("href"))
            .map(|href| href.trim().to_string())
            .filter(|href| !href.is_empty())
            .map(|href| {
                if href.starts_with('/') {
                    format!("{}{}", self.post_domain, href)
                } else {
                    format!("{}/{}", self.post_domain, href)
                }
            }))
    }
}

/// Parses a post date title. Absolute titles look like
/// `Apr 5, 2025 · 3:00 PM UTC`; relative ones like `2h` count back from `now`.
pub fn parse_post_date(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.contains('·') {
        return NaiveDateTime::parse_from_str(raw, ABSOLUTE_DATE_FORMAT)
            .ok()
            .map(|naive| naive.and_utc());
    }
    let captures = RELATIVE_DATE.captures(raw)?;
    let amount: i64 = captures[1].parse().ok()?;
    let delta = match &captures[2] {
        "m" => Duration::try_minutes(amount)?,
        "h" => Duration::try_hours(amount)?,
        "d" => Duration::try_days(amount)?,
        _ => return None,
    };
    now.checked_sub_signed(delta)
}

fn field<T: Default>(name: &str, result: ParseResult<T>) -> T {
    result.unwrap_or_else(|err| {
        warn!(field = name, error = %err, "Failed to extract field, using default");
        T::default()
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_content<D: DocumentQuery>(item: &D) -> ParseResult<Option<String>> {
    let Some(container) = item.select_first(CONTENT)? else {
        return Ok(None);
    };
    let chunks = container.text_chunks_excluding(CONTENT_DECORATIONS)?;
    Ok(Some(collapse_whitespace(&chunks.join(" "))))
}

fn reshare<D: DocumentQuery>(item: &D) -> ParseResult<(bool, Option<String>)> {
    let Some(header) = item.select_first(RETWEET_HEADER)? else {
        return Ok((false, None));
    };
    let text = collapse_whitespace(&header.joined_text(" "));
    let retweeter = RETWEETER
        .captures(&text)
        .map(|captures| captures[1].to_string());
    Ok((true, retweeter))
}

fn hashtags<D: DocumentQuery>(item: &D, content: &str) -> ParseResult<Vec<String>> {
    let mut tags: BTreeSet<String> = HASHTAG_TEXT
        .captures_iter(content)
        .map(|captures| captures[1].to_lowercase())
        .collect();
    for anchor in item.select_all(HASHTAG_LINKS)? {
        if let Some(href) = anchor.attribute("href") {
            tags.extend(
                HASHTAG_HREF
                    .captures_iter(&href)
                    .map(|captures| captures[1].to_lowercase()),
            );
        }
    }
    Ok(tags
        .into_iter()
        .filter(|tag| tag.chars().count() > 1)
        .collect())
}

fn mentions<D: DocumentQuery>(item: &D, content: &str) -> ParseResult<Vec<String>> {
    let mut handles: BTreeSet<String> = MENTION_TEXT
        .captures_iter(content)
        .map(|captures| captures[1].to_lowercase())
        .collect();
    for anchor in item.select_all(MENTION_LINKS)? {
        if let Some(href) = anchor.attribute("href") {
            let handle = href.trim().trim_start_matches('/').to_lowercase();
            if !handle.is_empty() {
                handles.insert(handle);
            }
        }
    }
    Ok(handles.into_iter().collect())
}

fn replying_to<D: DocumentQuery>(item: &D) -> ParseResult<Vec<String>> {
    let Some(block) = item.select_first(REPLYING_TO)? else {
        return Ok(Vec::new());
    };
    let text = block.joined_text(" ");
    let mut handles: BTreeSet<String> = MENTION_TEXT
        .captures_iter(&text)
        .map(|captures| captures[1].to_lowercase())
        .collect();
    for anchor in block.select_all("a")? {
        if let Some(href) = anchor.attribute("href") {
            handles.insert(href.trim().trim_start_matches('/').to_lowercase());
        }
    }
    handles.remove("");
    Ok(handles.into_iter().collect())
}

fn timestamp<D: DocumentQuery>(item: &D, now: DateTime<Utc>) -> ParseResult<Option<DateTime<Utc>>> {
    let title = item
        .select_first(DATE_LINK)?
        .and_then(|anchor| anchor.attribute("title"));
    Ok(title.and_then(|raw| {
        let parsed = parse_post_date(&raw, now);
        if parsed.is_none() {
            debug!(title = %raw, "Unrecognized post date");
        }
        parsed
    }))
}

fn stats<D: DocumentQuery>(item: &D) -> ParseResult<PostStats> {
    let mut stats = PostStats::default();
    for stat in item.select_all(STAT)? {
        let Some(icon) = stat.select_first(STAT_ICON)? else {
            continue;
        };
        let kind = icon
            .class_list()
            .iter()
            .find_map(|class| class.strip_prefix("icon-").map(str::to_string))
            .and_then(|suffix| StatKind::from_icon_suffix(&suffix));
        let Some(kind) = kind else {
            continue;
        };
        let value = stat
            .select_first("div")?
            .map(|div| div.joined_text(""))
            .map(|text| parse_count(&text))
            .unwrap_or(0);
        stats.set(kind, value);
    }
    Ok(stats)
}

fn parse_count(text: &str) -> u64 {
    text.replace(',', "").trim().parse().unwrap_or(0)
}

impl Default for TweetParser {
    fn default() -> Self {
        Self::new(&SourceSection::default())
    }
}

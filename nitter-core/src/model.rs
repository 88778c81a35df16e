use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ScrapeError, ScrapeResult};

pub const UNKNOWN_USERNAME: &str = "unknown_user";
pub const UNKNOWN_FULLNAME: &str = "Unknown User";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub fullname: String,
    #[serde(default)]
    pub verified: bool,
}

impl UserProfile {
    pub fn unknown() -> Self {
        Self {
            username: UNKNOWN_USERNAME.to_string(),
            fullname: UNKNOWN_FULLNAME.to_string(),
            verified: false,
        }
    }

    pub fn is_known(&self) -> bool {
        !self.username.is_empty() && self.username != UNKNOWN_USERNAME
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    Comments,
    Retweets,
    Quotes,
    Likes,
}

impl StatKind {
    pub const ALL: [StatKind; 4] = [
        StatKind::Comments,
        StatKind::Retweets,
        StatKind::Quotes,
        StatKind::Likes,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StatKind::Comments => "comments",
            StatKind::Retweets => "retweets",
            StatKind::Quotes => "quotes",
            StatKind::Likes => "likes",
        }
    }

    /// Maps the suffix of an `icon-*` class to a counter; anything else is ignored.
    pub fn from_icon_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "comment" => Some(StatKind::Comments),
            "retweet" => Some(StatKind::Retweets),
            "quote" => Some(StatKind::Quotes),
            "heart" => Some(StatKind::Likes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStats {
    pub comments: u64,
    pub retweets: u64,
    pub quotes: u64,
    pub likes: u64,
}

impl PostStats {
    pub fn set(&mut self, kind: StatKind, value: u64) {
        match kind {
            StatKind::Comments => self.comments = value,
            StatKind::Retweets => self.retweets = value,
            StatKind::Quotes => self.quotes = value,
            StatKind::Likes => self.likes = value,
        }
    }

    pub fn get(&self, kind: StatKind) -> u64 {
        match kind {
            StatKind::Comments => self.comments,
            StatKind::Retweets => self.retweets,
            StatKind::Quotes => self.quotes,
            StatKind::Likes => self.likes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachments {
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub gifs: Vec<String>,
}

impl MediaAttachments {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty() && self.gifs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub user: UserProfile,
    pub content: String,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub replying_to: Vec<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub stats: PostStats,
    pub media: MediaAttachments,
    pub link: Option<String>,
    #[serde(default)]
    pub is_retweet: bool,
    #[serde(default)]
    pub retweeter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    query: String,
    limit: usize,
    verbose: bool,
}

impl ScrapeRequest {
    pub fn new(query: impl Into<String>, limit: usize, verbose: bool) -> ScrapeResult<Self> {
        let query = query.into().trim().to_string();
        if query.is_empty() {
            return Err(ScrapeError::InvalidRequest("query must not be empty".into()));
        }
        if limit == 0 {
            return Err(ScrapeError::InvalidRequest("limit must be positive".into()));
        }
        Ok(Self {
            query,
            limit,
            verbose,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

use std::fmt;

use crate::config::SourceSection;
use crate::model::PostRecord;

/// First rule a record failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnknownAuthor,
    ContentTooShort { len: usize, min: usize },
    MissingLink,
    ForeignLink,
    MissingTimestamp,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::UnknownAuthor => write!(f, "author is unknown"),
            Rejection::ContentTooShort { len, min } => {
                write!(f, "content has {len} characters, need {min}")
            }
            Rejection::MissingLink => write!(f, "post link is missing"),
            Rejection::ForeignLink => write!(f, "post link is outside the source domain"),
            Rejection::MissingTimestamp => write!(f, "timestamp is missing"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordValidator {
    post_prefix: String,
    min_content_chars: usize,
}

impl RecordValidator {
    pub fn new(source: &SourceSection) -> Self {
        Self {
            post_prefix: source.post_prefix(),
            min_content_chars: source.min_content_chars,
        }
    }

    pub fn is_valid(&self, record: &PostRecord) -> bool {
        self.check(record).is_ok()
    }

    pub fn check(&self, record: &PostRecord) -> Result<(), Rejection> {
        if !record.user.is_known() {
            return Err(Rejection::UnknownAuthor);
        }
        let len = record.content.chars().count();
        if len < self.min_content_chars {
            return Err(Rejection::ContentTooShort {
                len,
                min: self.min_content_chars,
            });
        }
        match record.link.as_deref() {
            None => return Err(Rejection::MissingLink),
            Some(link) if !link.starts_with(&self.post_prefix) => {
                return Err(Rejection::ForeignLink)
            }
            Some(_) => {}
        }
        if record.timestamp.is_none() {
            return Err(Rejection::MissingTimestamp);
        }
        Ok(())
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new(&SourceSection::default())
    }
}

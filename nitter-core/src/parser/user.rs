use tracing::warn;

use crate::model::{UserProfile, UNKNOWN_FULLNAME, UNKNOWN_USERNAME};

use super::document::{DocumentQuery, ParseResult};

const HEADER_USERNAME: &str = "div.tweet-header a.username";
const ANY_USERNAME: &str = "a.username";
const FULLNAME: &str = "a.fullname";
const VERIFIED_BADGE: &str = "a.fullname span.verified-icon";

#[derive(Debug, Clone, Copy, Default)]
pub struct UserParser;

impl UserParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse<D: DocumentQuery>(&self, item: &D) -> UserProfile {
        match self.extract(item) {
            Ok(profile) => profile,
            Err(err) => {
                warn!(error = %err, "Failed to extract author, using placeholder");
                UserProfile::unknown()
            }
        }
    }

    fn extract<D: DocumentQuery>(&self, item: &D) -> ParseResult<UserProfile> {
        let handle = match item.select_first(HEADER_USERNAME)? {
            Some(node) => Some(node),
            None => item.select_first(ANY_USERNAME)?,
        };
        let username = handle
            .map(|node| normalize_username(&node.joined_text("")))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_USERNAME.to_string());

        let fullname = item
            .select_first(FULLNAME)?
            .map(|node| node.joined_text(" ").trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_FULLNAME.to_string());

        let verified = item.exists(VERIFIED_BADGE)?;

        Ok(UserProfile {
            username,
            fullname,
            verified,
        })
    }
}

fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').trim().to_lowercase()
}

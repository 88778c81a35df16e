mod document;
mod media;
mod tweet;
mod user;

pub use document::{DocumentQuery, HtmlFragment, ParseError, ParseResult};
pub use media::MediaParser;
pub use tweet::{parse_post_date, TweetParser};
pub use user::UserParser;

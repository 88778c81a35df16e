use tracing::{debug, warn};

use crate::model::MediaAttachments;

use super::document::{DocumentQuery, ParseError, ParseResult};

const IMAGES: &str = "div.attachments img[src*='/pic/']";
const VIDEOS: &str = "video:not(.gif)";
const GIFS: &str = "video.gif";
const GIF_SOURCE: &str = "source[src]";
const PIC_MARKER: &str = "/pic";

#[derive(Debug, Clone)]
pub struct MediaParser {
    media_host: String,
}

impl MediaParser {
    pub fn new(media_host: impl Into<String>) -> Self {
        let media_host = media_host.into().trim_end_matches('/').to_string();
        Self { media_host }
    }

    /// Collects image, video and gif references. Each category fails alone;
    /// a malformed reference only drops itself.
    pub fn parse<D: DocumentQuery>(&self, item: &D) -> MediaAttachments {
        MediaAttachments {
            images: self.category(item, "images", |item| {
                Ok(item
                    .select_all(IMAGES)?
                    .iter()
                    .filter_map(|img| img.attribute("src"))
                    .collect())
            }),
            videos: self.category(item, "videos", |item| {
                Ok(item
                    .select_all(VIDEOS)?
                    .iter()
                    .filter_map(|video| video.attribute("data-url"))
                    .collect())
            }),
            gifs: self.category(item, "gifs", |item| {
                let mut refs = Vec::new();
                for gif in item.select_all(GIFS)? {
                    let reference = match gif.attribute("data-url") {
                        Some(url) => Some(url),
                        None => gif
                            .select_first(GIF_SOURCE)?
                            .and_then(|source| source.attribute("src")),
                    };
                    refs.extend(reference);
                }
                Ok(refs)
            }),
        }
    }

    fn category<D, F>(&self, item: &D, kind: &str, collect: F) -> Vec<String>
    where
        D: DocumentQuery,
        F: FnOnce(&D) -> ParseResult<Vec<String>>,
    {
        let references = match collect(item) {
            Ok(references) => references,
            Err(err) => {
                warn!(kind, error = %err, "Failed to extract media");
                return Vec::new();
            }
        };
        references
            .iter()
            .filter_map(|raw| match self.normalize(raw) {
                Ok(url) => Some(url),
                Err(err) => {
                    debug!(kind, error = %err, "Skipping media reference");
                    None
                }
            })
            .collect()
    }

    /// `/pic/media%2Fabc.jpg?name=orig` becomes `{host}/media/abc.jpg`.
    pub fn normalize(&self, raw: &str) -> ParseResult<String> {
        let without_query = raw.split('?').next().unwrap_or_default();
        let start = without_query
            .find(PIC_MARKER)
            .ok_or_else(|| ParseError::Decode {
                input: raw.to_string(),
                reason: "no /pic segment".to_string(),
            })?;
        let encoded = &without_query[start + PIC_MARKER.len()..];
        let decoded = urlencoding::decode(encoded).map_err(|err| ParseError::Decode {
            input: raw.to_string(),
            reason: err.to_string(),
        })?;
        let decoded = decoded.split('?').next().unwrap_or_default();
        if decoded.is_empty() {
            return Err(ParseError::Decode {
                input: raw.to_string(),
                reason: "empty media path".to_string(),
            });
        }
        let path = if decoded.starts_with('/') {
            decoded.to_string()
        } else {
            format!("/{decoded}")
        };
        Ok(format!("{}{}", self.media_host, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::document::HtmlFragment;

    fn parser() -> MediaParser {
        MediaParser::new("https://pbs.twimg.com")
    }

    #[test]
    fn normalizes_encoded_pic_path() {
        assert_eq!(
            parser().normalize("/pic/media%2Fabc.jpg?name=orig").unwrap(),
            "https://pbs.twimg.com/media/abc.jpg"
        );
    }

    #[test]
    fn strips_percent_encoded_query() {
        let url = parser()
            .normalize("/pic/media%2FXYZ.jpg%3Fname%3Dsmall%26format%3Dwebp")
            .unwrap();
        assert_eq!(url, "https://pbs.twimg.com/media/XYZ.jpg");
        assert!(parser().normalize("/pic/%3Fname%3Dsmall").is_err());
    }

    #[test]
    fn rejects_references_without_pic() {
        let err = parser().normalize("/video/abc/123").unwrap_err();
        assert!(matches!(err, ParseError::Decode { .. }));
        assert!(parser().normalize("/pic/%FF%FE").is_err());
    }

    #[test]
    fn collects_each_category_and_skips_bad_entries() {
        let fragment = HtmlFragment::parse(
            r#"<div class="attachments">
  <img src="/pic/media%2Fone.jpg?name=small">
  <img src="/pic/media%2Ftwo.png">
  <video data-url="/pic/ext_tw_video_thumb%2F9%2Fclip.mp4"></video>
  <video data-url="/video/no-pic-here"></video>
  <video class="gif"><source src="/pic/tweet_video%2Floop.mp4"></video>
</div>"#,
        );
        let media = parser().parse(&fragment.root());
        assert_eq!(
            media.images,
            vec![
                "https://pbs.twimg.com/media/one.jpg",
                "https://pbs.twimg.com/media/two.png"
            ]
        );
        assert_eq!(
            media.videos,
            vec!["https://pbs.twimg.com/ext_tw_video_thumb/9/clip.mp4"]
        );
        assert_eq!(media.gifs, vec!["https://pbs.twimg.com/tweet_video/loop.mp4"]);
    }

    #[test]
    fn no_attachments_is_empty() {
        let fragment = HtmlFragment::parse("<div class=\"tweet-content\">plain text</div>");
        assert!(parser().parse(&fragment.root()).is_empty());
    }
}

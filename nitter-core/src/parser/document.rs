use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid selector {selector}: {reason}")]
    Selector { selector: String, reason: String },
    #[error("failed to decode {input}: {reason}")]
    Decode { input: String, reason: String },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Structural queries the parsing pipeline needs from an HTML node.
///
/// Selectors are CSS strings; an invalid selector is a [`ParseError`], a
/// selector that matches nothing is not.
pub trait DocumentQuery: Sized {
    fn select_first(&self, selector: &str) -> ParseResult<Option<Self>>;
    fn select_all(&self, selector: &str) -> ParseResult<Vec<Self>>;
    fn attribute(&self, name: &str) -> Option<String>;
    /// Order is unspecified; look classes up by value, never by position.
    fn class_list(&self) -> Vec<String>;
    /// Trimmed, non-empty descendant text nodes in document order.
    fn text_chunks(&self) -> Vec<String>;
    /// Like [`DocumentQuery::text_chunks`], skipping subtrees matching `excluded`.
    fn text_chunks_excluding(&self, excluded: &str) -> ParseResult<Vec<String>>;

    fn exists(&self, selector: &str) -> ParseResult<bool> {
        Ok(self.select_first(selector)?.is_some())
    }

    fn joined_text(&self, separator: &str) -> String {
        self.text_chunks().join(separator)
    }
}

fn compile(selector: &str) -> ParseResult<Selector> {
    Selector::parse(selector).map_err(|err| ParseError::Selector {
        selector: selector.to_string(),
        reason: format!("{err:?}"),
    })
}

impl<'a> DocumentQuery for ElementRef<'a> {
    fn select_first(&self, selector: &str) -> ParseResult<Option<Self>> {
        let selector = compile(selector)?;
        Ok(self.select(&selector).next())
    }

    fn select_all(&self, selector: &str) -> ParseResult<Vec<Self>> {
        let selector = compile(selector)?;
        Ok(self.select(&selector).collect())
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.value().attr(name).map(str::to_string)
    }

    fn class_list(&self) -> Vec<String> {
        self.value().classes().map(str::to_string).collect()
    }

    fn text_chunks(&self) -> Vec<String> {
        self.text()
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn text_chunks_excluding(&self, excluded: &str) -> ParseResult<Vec<String>> {
        let excluded = compile(excluded)?;
        let root = (**self).id();
        let mut chunks = Vec::new();
        for node in self.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node
                .ancestors()
                .take_while(|ancestor| ancestor.id() != root)
                .filter_map(ElementRef::wrap)
                .any(|element| excluded.matches(&element));
            if hidden {
                continue;
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        }
        Ok(chunks)
    }
}

/// An owned, parsed markup fragment for one timeline item.
pub struct HtmlFragment {
    html: Html,
}

impl HtmlFragment {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_fragment(markup),
        }
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }
}

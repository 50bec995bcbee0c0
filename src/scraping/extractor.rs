//! Document parsing: links and visible text from an HTML body
//!
//! The core only needs two things from a page: the hrefs of its link tags
//! (with the base they resolve against) and its visible text fragments. The
//! `DocumentParser` trait is that seam; `HtmlDocumentParser` implements it
//! with `scraper`.

use scraper::{Html, Selector};

/// Links and text found in a document body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    /// `<base href>` of the document, if any (may itself be relative)
    pub base_href: Option<String>,
    /// Raw href attribute values, in document order
    pub hrefs: Vec<String>,
    /// Visible text fragments, in document order
    pub text: Vec<String>,
}

/// Capability that turns body bytes into links and visible text
pub trait DocumentParser: Send + Sync {
    fn parse(&self, body: &[u8]) -> ParsedDocument;
}

/// Elements whose text content is never rendered
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// HTML parser backed by html5ever via `scraper`
pub struct HtmlDocumentParser {
    link_selector: Option<Selector>,
    base_selector: Option<Selector>,
}

impl HtmlDocumentParser {
    /// Create a parser for `<a href>` and `<area href>` links
    pub fn new() -> Self {
        Self {
            link_selector: Selector::parse("a[href], area[href]").ok(),
            base_selector: Selector::parse("base[href]").ok(),
        }
    }

    fn visible_text(document: &Html) -> Vec<String> {
        document
            .root_element()
            .descendants()
            .filter_map(|node| {
                let trimmed = node.value().as_text()?.trim();
                if trimmed.is_empty() {
                    return None;
                }
                let hidden = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|elem| HIDDEN_ELEMENTS.contains(&elem.name()))
                });
                (!hidden).then(|| trimmed.to_string())
            })
            .collect()
    }
}

impl Default for HtmlDocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for HtmlDocumentParser {
    fn parse(&self, body: &[u8]) -> ParsedDocument {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        let base_href = self.base_selector.as_ref().and_then(|selector| {
            document
                .select(selector)
                .next()
                .and_then(|el| el.value().attr("href"))
                .map(|href| href.trim().to_string())
                .filter(|href| !href.is_empty())
        });

        let hrefs = match &self.link_selector {
            Some(selector) => document
                .select(selector)
                .filter_map(|el| el.value().attr("href"))
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        ParsedDocument {
            base_href,
            hrefs,
            text: Self::visible_text(&document),
        }
    }
}

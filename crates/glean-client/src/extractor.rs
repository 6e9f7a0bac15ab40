use glean_core::error::HarvestError;
use glean_core::traits::Extractor;
use scraper::{ElementRef, Html, Node, Selector};

/// CSS-selector extractor using scraper.
///
/// Takes the first element matching the selector and turns each of its
/// children into one item. `<br>` children only separate items; text nodes
/// and other elements contribute their text. Whitespace runs collapse to a
/// single space, so an item never spans lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorExtractor;

impl SelectorExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Check that a selector parses, so bad config fails before any fetch.
    pub fn validate(selector: &str) -> Result<(), HarvestError> {
        compile(selector).map(|_| ())
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, html: &str, selector: &str) -> Result<Vec<String>, HarvestError> {
        let selector = compile(selector)?;
        let doc = Html::parse_document(html);

        let Some(container) = doc.select(&selector).next() else {
            return Ok(Vec::new());
        };

        let mut items = Vec::new();
        for child in container.children() {
            let text = match child.value() {
                Node::Text(text) => collapse_whitespace(text),
                Node::Element(element) if element.name() == "br" => continue,
                Node::Element(_) => match ElementRef::wrap(child) {
                    Some(element) => collapse_whitespace(&element.text().collect::<String>()),
                    None => continue,
                },
                _ => continue,
            };
            if !text.is_empty() {
                items.push(text);
            }
        }
        Ok(items)
    }
}

#[inline]
fn compile(selector: &str) -> Result<Selector, HarvestError> {
    Selector::parse(selector).map_err(|_| HarvestError::Selector(selector.into()))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

//! Visible-text extraction from HTML filings

use crate::text::collapse_whitespace;
use crate::{NormalizedText, NormalizedTextBuilder};
use scraper::{ElementRef, Html, Node};

/// Elements whose content never renders
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "title", "ix:header",
];

/// Elements that start and end a line of text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "caption", "center", "dd", "div",
    "dl", "dt", "figcaption", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "tfoot", "thead", "tr",
    "ul",
];

/// Table cells stay on the row's line, separated by a space
const CELL_ELEMENTS: &[&str] = &["td", "th"];

/// Maximum distance scanned ahead when locating a line in the source
const SOURCE_SEARCH_WINDOW: usize = 64 * 1024;

/// Extract the visible text of an HTML document, one line per block
pub fn extract_visible_text(source: &str) -> NormalizedText {
    let document = Html::parse_document(source);
    let mut collector = TextCollector::new(source);
    collector.walk(document.root_element());
    collector.finish()
}

fn is_hidden(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    if SKIPPED_ELEMENTS.contains(&value.name()) || value.attr("hidden").is_some() {
        return true;
    }

    value
        .attr("style")
        .map(|style| {
            let compact: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase();
            compact.contains("display:none")
        })
        .unwrap_or(false)
}

struct TextCollector<'s> {
    source: &'s str,
    cursor: usize,
    line: String,
    line_origin: Option<usize>,
    builder: NormalizedTextBuilder,
}

impl<'s> TextCollector<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            cursor: 0,
            line: String::new(),
            line_origin: None,
            builder: NormalizedTextBuilder::default(),
        }
    }

    fn walk(&mut self, element: ElementRef<'_>) {
        if is_hidden(&element) {
            return;
        }

        let name = element.value().name();
        let is_block = BLOCK_ELEMENTS.contains(&name);
        if is_block {
            self.break_line();
        }

        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.push_text(text),
                Node::Element(_) => {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        self.walk(child_element);
                    }
                }
                _ => {}
            }
        }

        if is_block {
            self.break_line();
        } else if CELL_ELEMENTS.contains(&name) {
            self.line.push(' ');
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.line_origin.is_none() {
            self.locate(text);
        }
        self.line.push_str(text);
    }

    /// Find the first word of a new line in the source, moving forward only
    fn locate(&mut self, text: &str) {
        let Some(word) = text.split_whitespace().next() else {
            return;
        };

        let mut end = (self.cursor + SOURCE_SEARCH_WINDOW).min(self.source.len());
        while !self.source.is_char_boundary(end) {
            end -= 1;
        }

        if let Some(pos) = self.source[self.cursor..end].find(word) {
            let start = self.cursor + pos;
            self.line_origin = Some(start);
            self.cursor = start + word.len();
        }
    }

    fn break_line(&mut self) {
        let collapsed = collapse_whitespace(&self.line);
        if !collapsed.is_empty() {
            self.builder.push_line(&collapsed, self.line_origin);
        }
        self.line.clear();
        self.line_origin = None;
    }

    fn finish(mut self) -> NormalizedText {
        self.break_line();
        self.builder.finish()
    }
}

//! Meeting-site and postal-address context finder
//!
//! Shared by the format classifier (a site keyword followed by an address
//! is a physical-meeting cue) and the location matcher (site and address
//! windows are where city/state tokens count).

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

use crate::snippet::{ceil_char_boundary, floor_char_boundary};
use crate::states::US_STATES;
use proxyscan_core::AnalysisConfig;

// Constant patterns; exercised by the tests below.
static SITE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:will|to|shall)\s+be\s+held\s+(?:in[\s-]+person\s+)?at|will\s+take\s+place\s+at|(?:meeting\s+)?location\s*:|address\s*:|place\s*:|at\s+(?:our|the\s+company['’]s)\s+(?:principal\s+executive\s+offices|(?:corporate\s+)?headquarters)|at\s+the\s+offices\s+of)",
    )
    .expect("site keyword pattern is valid")
});

static URL_AHEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[\s:]*(?:https?://|www\.)").expect("url pattern is valid"));

static STREET_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b\d{1,6}(?:-\d{1,6})?\s+(?:[NSEW]\.?\s+)?(?:[A-Z0-9][A-Za-z0-9.'-]*\s+){0,4}(?i:street|st|avenue|ave|boulevard|blvd|road|rd|drive|dr|lane|ln|way|parkway|pkwy|place|pl|court|ct|plaza|square|sq|circle|cir|highway|hwy|center|centre|terrace|trail|broadway)\b\.?",
    )
    .expect("street address pattern is valid")
});

static CITY_STATE_ZIP: Lazy<Regex> = Lazy::new(|| {
    let names = US_STATES
        .iter()
        .map(|(_, name)| regex::escape(name).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"\b[A-Z][A-Za-z.'-]+(?:[ \t]+[A-Z][A-Za-z.'-]+){{0,3}},?\s+(?:[A-Z]{{2}}|(?i:{names}))\.?,?\s+\d{{5}}(?:-\d{{4}})?\b"
    ))
    .expect("city/state/zip pattern is valid")
});

/// A meeting-site keyword and the text that follows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteCue {
    /// Span of the keyword itself
    pub keyword: Range<usize>,
    /// Keyword start to window end
    pub window: Range<usize>,
    /// First postal address inside the window
    pub address: Option<Range<usize>>,
}

impl SiteCue {
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Keyword through the end of the address, or just the keyword
    pub fn span(&self) -> Range<usize> {
        match &self.address {
            Some(address) => self.keyword.start..address.end,
            None => self.keyword.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Site,
    Address,
}

/// A region of normalized text where location tokens are meaningful
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    pub kind: WindowKind,
    pub range: Range<usize>,
}

/// Postal addresses (street lines and city/state/ZIP lines), sorted and merged
///
/// Spans separated only by commas and whitespace join into one address.
pub fn find_addresses(text: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = STREET_ADDRESS
        .find_iter(text)
        .chain(CITY_STATE_ZIP.find_iter(text))
        .map(|m| m.range())
        .collect();
    spans.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last)
                if span.start <= last.end
                    || text[last.end..span.start]
                        .chars()
                        .all(|c| c.is_whitespace() || c == ',') =>
            {
                last.end = last.end.max(span.end)
            }
            _ => merged.push(span),
        }
    }
    merged
}

/// Meeting-site keywords with their windows
///
/// A window runs `site_window` bytes past the keyword and stops at the first
/// blank line. Keywords followed directly by a URL are not physical sites.
pub fn find_site_cues(text: &str, site_window: usize) -> Vec<SiteCue> {
    SITE_KEYWORD
        .find_iter(text)
        .filter(|m| !URL_AHEAD.is_match(&text[m.end()..]))
        .map(|m| {
            let limit = floor_char_boundary(text, m.end().saturating_add(site_window));
            let end = text[m.end()..limit]
                .find("\n\n")
                .map(|pos| m.end() + pos)
                .unwrap_or(limit);

            let address = find_addresses(&text[m.end()..end])
                .into_iter()
                .next()
                .map(|r| m.end() + r.start..m.end() + r.end);

            SiteCue {
                keyword: m.range(),
                window: m.start()..end,
                address,
            }
        })
        .collect()
}

/// Site windows first, then address windows that no site window already covers
pub fn location_contexts(text: &str, config: &AnalysisConfig) -> Vec<ContextWindow> {
    let mut windows: Vec<ContextWindow> = find_site_cues(text, config.site_window)
        .into_iter()
        .map(|cue| ContextWindow {
            kind: WindowKind::Site,
            range: cue.window,
        })
        .collect();

    let site_count = windows.len();
    for address in find_addresses(text) {
        let covered = windows[..site_count]
            .iter()
            .any(|w| w.range.start <= address.start && address.end <= w.range.end);
        if covered {
            continue;
        }

        windows.push(ContextWindow {
            kind: WindowKind::Address,
            range: floor_char_boundary(text, address.start.saturating_sub(config.address_window))
                ..ceil_char_boundary(text, address.end.saturating_add(config.address_window)),
        });
    }

    windows
}

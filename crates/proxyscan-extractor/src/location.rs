//! Meeting-location matching against a target city and state

use std::ops::Range;

use regex::Regex;
use tracing::debug;

use crate::address::location_contexts;
use crate::snippet;
use crate::states;
use crate::ExtractorError;
use proxyscan_core::{AnalysisConfig, Confidence, LocationMatchResult, TargetLocation};

/// Case-insensitive, whitespace-flexible pattern for a multi-word name
fn name_pattern(name: &str) -> Result<Regex, ExtractorError> {
    let words: Vec<String> = name.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return Err(ExtractorError::InvalidTarget(format!(
            "empty location name: {name:?}"
        )));
    }

    let trimmed = name.trim();
    let lead = if trimmed.starts_with(|c: char| c.is_alphanumeric()) {
        r"\b"
    } else {
        ""
    };
    let tail = if trimmed.ends_with(|c: char| c.is_alphanumeric()) {
        r"\b"
    } else {
        ""
    };

    Ok(Regex::new(&format!(
        r"(?i){lead}{}{tail}",
        words.join(r"\s+")
    ))?)
}

/// Upper-case two-letter code, matched case-sensitively
fn code_pattern(code: &str) -> Result<Regex, ExtractorError> {
    Ok(Regex::new(&format!(r"\b{}\b", regex::escape(code)))?)
}

/// State code and full-name patterns for a user-supplied state
fn state_patterns(state: &str) -> Result<Vec<Regex>, ExtractorError> {
    let state = state.trim();
    match states::lookup(state) {
        Some((code, name)) => Ok(vec![code_pattern(code)?, name_pattern(name)?]),
        None if state.len() == 2 && state.chars().all(|c| c.is_ascii_alphabetic()) => {
            Ok(vec![code_pattern(&state.to_ascii_uppercase())?])
        }
        None => Ok(vec![name_pattern(state)?]),
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Locates a target city/state inside meeting-site and address contexts
#[derive(Debug, Clone)]
pub struct LocationMatcher {
    target: TargetLocation,
    city: Regex,
    state: Vec<Regex>,
    config: AnalysisConfig,
}

impl LocationMatcher {
    pub fn new(target: &TargetLocation, config: AnalysisConfig) -> Result<Self, ExtractorError> {
        let city = name_pattern(&target.city)?;
        let state = match &target.state {
            Some(state) => state_patterns(state)?,
            None => Vec::new(),
        };

        Ok(Self {
            target: target.clone(),
            city,
            state,
            config,
        })
    }

    pub fn target(&self) -> &TargetLocation {
        &self.target
    }

    /// First state match in `window` that does not overlap `city`
    fn find_state(&self, text: &str, window: &Range<usize>, city: &Range<usize>) -> Option<Range<usize>> {
        let slice = &text[window.clone()];
        self.state
            .iter()
            .flat_map(|pattern| pattern.find_iter(slice))
            .map(|m| window.start + m.start()..window.start + m.end())
            .filter(|state| !overlaps(state, city))
            .min_by_key(|state| state.start)
    }

    fn snippet(&self, text: &str, span: Range<usize>) -> proxyscan_core::Snippet {
        snippet::around(
            text,
            span.start,
            span.end,
            self.config.snippet_context,
            self.config.max_snippet_len,
        )
    }

    /// Match the target location against normalized filing text
    pub fn match_location(&self, text: &str) -> LocationMatchResult {
        let windows = location_contexts(text, &self.config);
        let mut city_only: Option<Range<usize>> = None;

        for window in &windows {
            let cities: Vec<Range<usize>> = self
                .city
                .find_iter(&text[window.range.clone()])
                .map(|m| window.range.start + m.start()..window.range.start + m.end())
                .collect();

            for city in &cities {
                if let Some(state) = self.find_state(text, &window.range, city) {
                    debug!(kind = ?window.kind, city = city.start, state = state.start, "city and state matched");
                    return LocationMatchResult {
                        matched: true,
                        confidence: Confidence::High,
                        snippet: self.snippet(text, city.start.min(state.start)..city.end.max(state.end)),
                        note: None,
                    };
                }
            }

            if city_only.is_none() {
                city_only = cities.first().cloned();
            }
        }

        if let Some(city) = city_only {
            let note = match &self.target.state {
                None => format!(
                    "city \"{}\" matched without a state; other states may have a city of the same name",
                    self.target.city
                ),
                Some(state) => format!(
                    "city \"{}\" matched but state \"{}\" not found in the same context",
                    self.target.city, state
                ),
            };
            return LocationMatchResult {
                matched: true,
                confidence: Confidence::Medium,
                snippet: self.snippet(text, city),
                note: Some(note),
            };
        }

        if let Some(m) = self.city.find(text) {
            return LocationMatchResult {
                matched: false,
                confidence: Confidence::Low,
                snippet: self.snippet(text, m.range()),
                note: Some("city mentioned outside any meeting or address context".to_string()),
            };
        }

        LocationMatchResult::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn matcher(city: &str, state: Option<&str>) -> LocationMatcher {
        let target = TargetLocation::new(city, state.map(String::from)).unwrap();
        LocationMatcher::new(&target, AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_city_and_state_in_site_window_is_high() {
        let text = "The meeting will be held in person at 123 Main St, Chicago, IL 60601.";
        let result = matcher("Chicago", Some("IL")).match_location(text);

        assert!(result.matched);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.snippet.text.contains("Chicago, IL"));
        assert!(result.note.is_none());
    }

    #[test]
    fn test_full_state_name_matches() {
        let text = "The Annual Meeting will be held at 1 Apple Park Way, Cupertino, California 95014.";
        let result = matcher("cupertino", Some("CA")).match_location(text);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_city_without_state_is_medium_with_note() {
        let text = "The meeting will be held at 1 Main Street, Springfield, IL 62701.";
        let result = matcher("Springfield", None).match_location(text);

        assert!(result.matched);
        assert_eq!(result.confidence, Confidence::Medium);
        assert!(result.note.unwrap().contains("without a state"));
    }

    #[test]
    fn test_wrong_state_is_medium() {
        let text = "The meeting will be held at 1 Main Street, Springfield, IL 62701.";
        let result = matcher("Springfield", Some("Massachusetts")).match_location(text);

        assert!(result.matched);
        assert_eq!(result.confidence, Confidence::Medium);
        assert!(result.note.unwrap().contains("Massachusetts"));
    }

    #[test]
    fn test_city_outside_context_is_low() {
        let text = "We opened a new store in Chicago last year.";
        let result = matcher("Chicago", Some("IL")).match_location(text);

        assert!(!result.matched);
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.snippet.text, text);
    }

    #[test]
    fn test_no_city_is_none() {
        let text = "The meeting will be held at 200 Park Avenue, New York, NY 10166.";
        let result = matcher("Chicago", Some("IL")).match_location(text);

        assert!(!result.matched);
        assert_eq!(result.confidence, Confidence::None);
        assert!(result.snippet.is_empty());
    }

    #[test]
    fn test_lowercase_state_word_is_not_a_code() {
        // "in" and "or" are not Indiana and Oregon
        let text = "Location: Portland convention center, or in the lobby";
        let result = matcher("Portland", Some("OR")).match_location(text);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn test_state_overlapping_city_does_not_count() {
        let text = "The meeting will be held at the offices of Acme in New York.";
        let result = matcher("New York", Some("NY")).match_location(text);
        assert_eq!(result.confidence, Confidence::Medium);

        let text = "The meeting will be held at 200 Park Avenue, New York, NY 10166.";
        let result = matcher("New York", Some("New York")).match_location(text);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_multi_word_city_spans_whitespace() {
        let text = "Location: 100 Main Street, Salt\nLake   City, Utah 84101";
        let result = matcher("Salt Lake City", Some("UT")).match_location(text);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_site_window_checked_before_address_window() {
        let text = "Our headquarters: 1 Main Street, Springfield, IL 62701.\n\n\
            The meeting will be held at 10 State Street, Springfield, MA 01103.";
        let result = matcher("Springfield", Some("MA")).match_location(text);

        assert_eq!(result.confidence, Confidence::High);
        assert!(result.snippet.text.contains("MA"));
    }

    #[test]
    fn test_blank_city_is_rejected() {
        let target = TargetLocation {
            city: "   ".to_string(),
            state: None,
        };
        assert!(matches!(
            LocationMatcher::new(&target, AnalysisConfig::default()),
            Err(ExtractorError::InvalidTarget(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_supplying_state_never_lowers_confidence(
            pieces in prop::collection::vec(
                prop::sample::select(vec![
                    "The meeting will be held at 5 Elm Street, Springfield, IL 62701.",
                    "Springfield is where we were founded.",
                    "Location: Springfield Civic Center",
                    "Our office is at 9 Oak Road, Peoria, IL 61602.",
                    "Vote by mail.",
                    "\n\n",
                ]),
                0..6,
            ),
            state in prop::sample::select(vec!["IL", "MA", "Illinois", "OH"]),
        ) {
            let text = pieces.concat();
            let without = matcher("Springfield", None).match_location(&text);
            let with = matcher("Springfield", Some(state)).match_location(&text);
            prop_assert!(with.confidence >= without.confidence);
            prop_assert_eq!(with.matched, without.matched);
        }
    }
}

//! Meeting-format classification
//!
//! Cues come from two places:
//! - [`FORMAT_RULES`], an ordered table of phrase patterns
//! - meeting-site keywords from [`crate::address`], which count as
//!   in-person cues (strong when an address follows)
//!
//! Table order is precedence: hybrid rules first, then virtual, then
//! in-person. Overlapping rule matches are resolved by format rank
//! first, so a hybrid phrase keeps its span against an earlier-starting
//! "held in person". Within a rank the earlier start wins and a tie goes
//! to the earlier table entry.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::find_site_cues;
use crate::snippet;
use proxyscan_core::{AnalysisConfig, ClassificationResult, Confidence, MeetingFormat};

// ============================================================================
// Rule Table
// ============================================================================

/// How much a single cue says on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueWeight {
    Strong,
    Weak,
}

/// Where a cue came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueSource {
    Rule,
    Site,
}

/// A compiled rule
#[derive(Debug)]
pub struct FormatRule {
    pub label: &'static str,
    pub pattern: Regex,
    pub format: MeetingFormat,
    pub weight: CueWeight,
}

use CueWeight::{Strong, Weak};
use MeetingFormat::{Hybrid, InPerson, Virtual};

const RULE_TABLE: &[(&str, &str, MeetingFormat, CueWeight)] = &[
    // Hybrid
    (
        "hybrid meeting",
        r"(?i)\bhybrid\s+(?:annual\s+|special\s+)?(?:meeting|format)\b",
        Hybrid,
        Strong,
    ),
    (
        "in person or virtually",
        r"(?i)\bin[\s-]+person\s+or\s+(?:virtually|online|remotely|by\s+remote\s+communications?|via\s+(?:a\s+)?(?:live\s+)?(?:audio\s+)?webcast)\b",
        Hybrid,
        Strong,
    ),
    (
        "virtually or in person",
        r"(?i)\b(?:virtually|online|remotely)\s+or\s+in[\s-]+person\b",
        Hybrid,
        Strong,
    ),
    (
        "virtually and at a physical location",
        r"(?i)\b(?:virtually|online)\s+and\s+(?:in[\s-]+person\s+)?at\s+(?:a\s+)?physical\s+location\b|\bboth\s+in[\s-]+person\s+and\s+(?:virtually|online|via\s+(?:a\s+)?(?:live\s+)?webcast)\b",
        Hybrid,
        Strong,
    ),
    // Virtual, strong
    (
        "held solely online",
        r"(?i)\b(?:solely|exclusively|entirely|only)\s+(?:online|virtually|by\s+(?:means\s+of\s+)?remote\s+communications?|via\s+(?:a\s+)?(?:live\s+)?(?:audio\s+)?webcast)\b",
        Virtual,
        Strong,
    ),
    ("virtual-only", r"(?i)\bvirtual[\s-]+only\b", Virtual, Strong),
    (
        "virtual meeting",
        r"(?i)\bvirtual\s+(?:annual\s+|special\s+)?(?:meeting|(?:share|stock)holders?\s+meeting)\b",
        Virtual,
        Strong,
    ),
    (
        "held virtually",
        r"(?i)\b(?:held|conducted|hosted|attend|participate)\s+virtually\b",
        Virtual,
        Strong,
    ),
    (
        "held via live webcast",
        r"(?i)\b(?:held|conducted)\s+(?:exclusively\s+)?(?:via|by|through)\s+(?:a\s+)?(?:live\s+)?(?:audio\s+|video\s+)?webcast\b",
        Virtual,
        Strong,
    ),
    (
        "virtualshareholdermeeting.com",
        r"(?i)virtualshareholdermeeting\.com",
        Virtual,
        Strong,
    ),
    (
        "no physical location",
        r"(?i)\bno\s+(?:physical|in[\s-]+person)\s+(?:location|meeting)\b|\bnot\s+(?:be\s+)?(?:held|hold|have)\s+(?:at\s+)?(?:a\s+|an\s+)?(?:physical|in[\s-]+person)\s+(?:location|meeting)\b|\bnot\s+be\s+held\s+in[\s-]+person\b",
        Virtual,
        Strong,
    ),
    (
        "not able to attend in person",
        r"(?i)\b(?:not|cannot|unable\s+to)\s+(?:be\s+able\s+to\s+)?attend\s+(?:the\s+(?:annual\s+)?meeting\s+)?in[\s-]+person\b",
        Virtual,
        Strong,
    ),
    (
        "held at www",
        r"(?i)\b(?:held|attend|access)\w*\s+(?:at|via)\s+(?:https?://)?www\.",
        Virtual,
        Strong,
    ),
    // Virtual, weak
    (
        "live webcast",
        r"(?i)\blive\s+(?:audio\s+|video\s+)?webcast\b",
        Virtual,
        Weak,
    ),
    ("webcast", r"(?i)\bwebcast\b", Virtual, Weak),
    (
        "remote communication",
        r"(?i)\bremote\s+communications?\b",
        Virtual,
        Weak,
    ),
    ("virtual", r"(?i)\bvirtual\b", Virtual, Weak),
    ("teleconference", r"(?i)\btele-?conference\b", Virtual, Weak),
    // In person
    (
        "held in person",
        r"(?i)\b(?:held|hold|conducted)\s+in[\s-]+person\b",
        InPerson,
        Strong,
    ),
    ("in person", r"(?i)\bin[\s-]+person\b", InPerson, Weak),
    (
        "physical location",
        r"(?i)\bphysical\s+location\b",
        InPerson,
        Weak,
    ),
];

/// Compiled rule table, in precedence order
pub static FORMAT_RULES: Lazy<Vec<FormatRule>> = Lazy::new(|| {
    RULE_TABLE
        .iter()
        .filter_map(|&(label, pattern, format, weight)| {
            Regex::new(pattern).ok().map(|pattern| FormatRule {
                label,
                pattern,
                format,
                weight,
            })
        })
        .collect()
});

static MEETING_CONTEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:annual|special)\s+meeting\b|\bmeeting\s+of\s+(?:share|stock)holders\b|\bthe\s+meeting\b",
    )
    .expect("meeting context pattern is valid")
});

// ============================================================================
// Cues
// ============================================================================

/// A fired rule or meeting-site keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCue {
    pub label: &'static str,
    pub format: MeetingFormat,
    pub weight: CueWeight,
    pub source: CueSource,
    pub start: usize,
    pub end: usize,
}

impl FormatCue {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn is_strong(&self) -> bool {
        self.weight == Strong
    }

    /// A site keyword followed by a postal address
    pub fn is_physical_address(&self) -> bool {
        self.source == CueSource::Site && self.is_strong()
    }
}

/// Bytes between two spans, `None` if they overlap
fn gap(a: &Range<usize>, b: &Range<usize>) -> Option<usize> {
    if a.end <= b.start {
        Some(b.start - a.end)
    } else if b.end <= a.start {
        Some(a.start - b.end)
    } else {
        None
    }
}

fn conflicts(chosen: MeetingFormat, other: MeetingFormat) -> bool {
    chosen != other && chosen != Hybrid && other != Hybrid
}

fn format_rank(format: MeetingFormat) -> u8 {
    match format {
        Hybrid => 0,
        Virtual => 1,
        _ => 2,
    }
}

/// Rule matches with overlaps removed, in document order
pub fn rule_cues(text: &str) -> Vec<FormatCue> {
    let mut hits: Vec<(u8, usize, usize, usize)> = FORMAT_RULES
        .iter()
        .enumerate()
        .flat_map(|(idx, rule)| {
            let rank = format_rank(rule.format);
            rule.pattern
                .find_iter(text)
                .map(move |m| (rank, m.start(), idx, m.end()))
        })
        .collect();
    hits.sort_unstable();

    let mut claimed: Vec<Range<usize>> = Vec::new();
    let mut cues = Vec::new();
    for (_, start, idx, end) in hits {
        let span = start..end;
        if claimed.iter().any(|c| gap(c, &span).is_none()) {
            continue;
        }
        let rule = &FORMAT_RULES[idx];
        cues.push(FormatCue {
            label: rule.label,
            format: rule.format,
            weight: rule.weight,
            source: CueSource::Rule,
            start,
            end,
        });
        claimed.push(span);
    }
    cues.sort_by_key(|c| c.start);
    cues
}

// ============================================================================
// Classifier
// ============================================================================

/// Meeting-format classifier over normalized filing text
#[derive(Debug, Clone, Default)]
pub struct FormatClassifier {
    config: AnalysisConfig,
}

impl FormatClassifier {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// All cues in document order: deduplicated rule matches plus site keywords
    pub fn cues(&self, text: &str) -> Vec<FormatCue> {
        let mut cues = rule_cues(text);
        cues.extend(
            find_site_cues(text, self.config.site_window)
                .into_iter()
                .map(|site| {
                    let span = site.span();
                    let (label, weight) = if site.has_address() {
                        ("meeting site with address", Strong)
                    } else {
                        ("meeting site keyword", Weak)
                    };
                    FormatCue {
                        label,
                        format: InPerson,
                        weight,
                        source: CueSource::Site,
                        start: span.start,
                        end: span.end,
                    }
                }),
        );
        cues.sort_by_key(|c| (c.start, c.end));
        cues
    }

    /// Classify the meeting format of a filing
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let cues = self.cues(text);
        if cues.is_empty() {
            return ClassificationResult::unknown("no meeting-format cues found");
        }

        for cue in &cues {
            debug!(
                label = cue.label,
                format = %cue.format,
                weight = ?cue.weight,
                start = cue.start,
                "format cue"
            );
        }

        let context: Vec<Range<usize>> = MEETING_CONTEXT.find_iter(text).map(|m| m.range()).collect();

        if let Some(primary) = cues.iter().find(|c| c.format == Hybrid) {
            return self.verdict(text, &cues, &context, primary);
        }

        if let Some(result) = self.inferred_hybrid(text, &cues) {
            return result;
        }

        for format in [Virtual, InPerson] {
            if let Some(primary) = cues.iter().find(|c| c.format == format && c.is_strong()) {
                return self.verdict(text, &cues, &context, primary);
            }
        }

        for format in [Virtual, InPerson] {
            if let Some(primary) = cues.iter().find(|c| c.format == format) {
                return self.verdict(text, &cues, &context, primary);
            }
        }

        ClassificationResult::unknown("no meeting-format cues found")
    }

    /// Hybrid from a virtual cue near a meeting address
    fn inferred_hybrid(&self, text: &str, cues: &[FormatCue]) -> Option<ClassificationResult> {
        let physical: Vec<&FormatCue> = cues.iter().filter(|c| c.is_physical_address()).collect();
        if physical.is_empty() {
            return None;
        }

        let near_address = |cue: &&FormatCue| {
            physical.iter().find(|site| {
                gap(&cue.range(), &site.range()).map_or(true, |d| d <= self.config.hybrid_window)
            })
        };

        let virtual_cues = || cues.iter().filter(|c| c.format == Virtual);
        let (cue, site) = virtual_cues()
            .filter(|c| c.is_strong())
            .find_map(|c| near_address(&c).map(|s| (c, *s)))
            .or_else(|| virtual_cues().find_map(|c| near_address(&c).map(|s| (c, *s))))?;

        let confidence = if cue.is_strong() {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        Some(ClassificationResult {
            format: Hybrid,
            confidence,
            snippet: snippet::around(
                text,
                cue.start.min(site.start),
                cue.end.max(site.end),
                self.config.snippet_context,
                self.config.max_snippet_len,
            ),
            note: Some(format!(
                "virtual cue \"{}\" near a meeting address",
                cue.label
            )),
        })
    }

    fn verdict(
        &self,
        text: &str,
        cues: &[FormatCue],
        context: &[Range<usize>],
        primary: &FormatCue,
    ) -> ClassificationResult {
        let window = self.config.corroboration_window;
        let near = |range: &Range<usize>| {
            gap(&primary.range(), range).is_some_and(|d| d <= window)
        };

        let corroborated = cues
            .iter()
            .filter(|c| c.format == primary.format)
            .any(|c| near(&c.range()))
            || context.iter().any(near);

        // Strong cues conflict anywhere, weak rule cues only nearby
        let conflict = cues
            .iter()
            .filter(|c| conflicts(primary.format, c.format))
            .filter(|c| {
                c.is_strong()
                    || (c.source == CueSource::Rule
                        && gap(&primary.range(), &c.range())
                            .map_or(true, |d| d <= self.config.hybrid_window))
            })
            .min_by_key(|c| (!c.is_strong(), c.start));

        let confidence = match (primary.weight, corroborated, conflict.is_some()) {
            (Strong, true, false) => Confidence::High,
            (Strong, _, _) => Confidence::Medium,
            (Weak, true, false) => Confidence::Medium,
            (Weak, _, _) => Confidence::Low,
        };

        let note = conflict.map(|c| {
            format!(
                "conflicting {} cue \"{}\" at offset {}",
                c.format, c.label, c.start
            )
        });

        ClassificationResult {
            format: primary.format,
            confidence,
            snippet: snippet::around(
                text,
                primary.start,
                primary.end,
                self.config.snippet_context,
                self.config.max_snippet_len,
            ),
            note,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classify(text: &str) -> ClassificationResult {
        FormatClassifier::default().classify(text)
    }

    #[test]
    fn test_every_rule_compiles() {
        assert_eq!(FORMAT_RULES.len(), RULE_TABLE.len());
    }

    #[test]
    fn test_rule_table_precedence_order() {
        let ranks: Vec<_> = FORMAT_RULES.iter().map(|r| format_rank(r.format)).collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_overlapping_rules_deduplicate() {
        let cues = rule_cues("You will not be able to attend the meeting in person.");
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].label, "not able to attend in person");

        let cues = rule_cues("a virtual meeting");
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].label, "virtual meeting");
    }

    #[test]
    fn test_hybrid_phrase_claims_span_before_earlier_rules() {
        let cues = rule_cues("The meeting will be held in person or virtually.");
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].label, "in person or virtually");

        let cues = rule_cues("Shareholders may participate virtually or in person.");
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].format, Hybrid);
    }

    #[test]
    fn test_hybrid_phrase_after_lead_verb() {
        let result = classify("The annual meeting will be held in person or virtually.");
        assert_eq!(result.format, Hybrid);
        assert_eq!(result.confidence, Confidence::High);

        let result = classify("The annual meeting will be held virtually and at a physical location.");
        assert_eq!(result.format, Hybrid);

        let result = classify("Shareholders may participate virtually or in person at the annual meeting.");
        assert_eq!(result.format, Hybrid);
    }

    #[test]
    fn test_nearby_weak_conflict_blocks_high() {
        let text = "The annual meeting will be held in person. \
            The meeting will also be available via live webcast.";
        let result = classify(text);

        assert_eq!(result.format, InPerson);
        assert_eq!(result.confidence, Confidence::Medium);
        assert!(result.note.unwrap().contains("live webcast"));
    }

    #[test]
    fn test_distant_weak_conflict_ignored() {
        let text = format!(
            "The annual meeting will be held in person.{}Last year's presentation is archived as a webcast.",
            " filler".repeat(100)
        );
        let result = classify(&text);

        assert_eq!(result.format, InPerson);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.note.is_none());
    }

    #[test]
    fn test_site_keyword_does_not_conflict_with_virtual() {
        let text = "The annual meeting will be held at 9:00 a.m. Pacific Time and will be conducted solely online.";
        let result = classify(text);

        assert_eq!(result.format, Virtual);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_weak_cue_with_conflict_is_low() {
        let result = classify("A teleconference line and an in-person option are offered to shareholders.");
        assert_eq!(result.format, Virtual);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.note.is_some());
    }

    #[test]
    fn test_virtual_high_confidence() {
        let text = "The annual meeting will be held virtually via live webcast.";
        let result = classify(text);

        assert_eq!(result.format, Virtual);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.snippet.text.contains("held virtually"));
        assert!(result.note.is_none());
    }

    #[test]
    fn test_in_person_with_address() {
        let text = "The meeting will be held in person at 123 Main St, Chicago, IL 60601.";
        let result = classify(text);

        assert_eq!(result.format, InPerson);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_explicit_hybrid() {
        let text = "Shareholders may attend the 2024 Annual Meeting in person or virtually.";
        let result = classify(text);

        assert_eq!(result.format, Hybrid);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_inferred_hybrid_from_address_and_webcast() {
        let text = "The Annual Meeting will be held at 500 Boylston Street, Boston, MA 02116. \
            The meeting will also be available by live webcast.";
        let result = classify(text);

        assert_eq!(result.format, Hybrid);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.note.unwrap().contains("live webcast"));
    }

    #[test]
    fn test_inferred_hybrid_strong_virtual_is_medium() {
        let text = "The Annual Meeting will be held at 500 Boylston Street, Boston, MA 02116 \
            and shareholders may also attend virtually at www.virtualshareholdermeeting.com/XYZ2024.";
        let result = classify(text);

        assert_eq!(result.format, Hybrid);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn test_single_weak_cue_is_low() {
        let result = classify("Proxy materials mention a teleconference.");
        assert_eq!(result.format, Virtual);
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn test_conflicting_strong_cue_lowers_confidence() {
        let text = format!(
            "The annual meeting will be a virtual meeting.{}Last year our meeting was held in person.",
            " filler".repeat(100)
        );
        let result = classify(&text);

        assert_eq!(result.format, Virtual);
        assert_eq!(result.confidence, Confidence::Medium);
        assert!(result.note.unwrap().contains("held in person"));
    }

    #[test]
    fn test_negated_in_person_is_virtual() {
        let result = classify("The Annual Meeting will not be held in person.");
        assert_eq!(result.format, Virtual);
    }

    #[test]
    fn test_no_cues_is_unknown() {
        let result = classify("Item 1. Election of directors. The board recommends FOR.");
        assert_eq!(result.format, MeetingFormat::Unknown);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.snippet.is_empty());
    }

    const VIRTUAL_SENTENCES: &[&str] = &[
        "The annual meeting will be held virtually.",
        "This year's meeting is a virtual-only meeting.",
        "Visit www.virtualshareholdermeeting.com/ABC2024 to participate.",
        "There will be no physical location for the meeting.",
        "You will not be able to attend the meeting in person.",
        "The meeting will be conducted via live webcast.",
        "Shareholders may submit questions by remote communication.",
    ];

    const FILLER: &[&str] = &[
        "Proposal 2 concerns the ratification of auditors.",
        "The board recommends a vote FOR each nominee.",
        "Record date is March 1, 2024.",
        "Please vote your shares promptly.",
    ];

    fn document(virtual_idx: Vec<usize>, filler_idx: Vec<usize>) -> String {
        virtual_idx
            .iter()
            .map(|&i| VIRTUAL_SENTENCES[i])
            .chain(filler_idx.iter().map(|&i| FILLER[i]))
            .collect::<Vec<_>>()
            .join("\n")
    }

    const HYBRID_LEADS: &[&str] = &[
        "The annual meeting will be held",
        "Shareholders may attend the annual meeting",
        "Shareholders may participate",
        "Holders of record may vote and ask questions",
    ];

    const HYBRID_PHRASES: &[&str] = &[
        "in person or virtually",
        "in person or online",
        "in person or via live webcast",
        "virtually or in person",
        "online or in person",
        "virtually and at a physical location",
        "online and in person at a physical location",
        "both in person and virtually",
        "in a hybrid meeting format",
    ];

    proptest! {
        #[test]
        fn prop_explicit_hybrid_phrase_is_hybrid(
            lead in 0..HYBRID_LEADS.len(),
            phrase in 0..HYBRID_PHRASES.len(),
        ) {
            let text = format!("{} {}.", HYBRID_LEADS[lead], HYBRID_PHRASES[phrase]);
            let result = classify(&text);
            prop_assert_eq!(result.format, Hybrid);
            prop_assert!(result.confidence >= Confidence::Medium);
        }

        #[test]
        fn prop_virtual_only_text_is_virtual(
            virtual_idx in prop::collection::vec(0..VIRTUAL_SENTENCES.len(), 1..5),
            filler_idx in prop::collection::vec(0..FILLER.len(), 0..5),
        ) {
            let result = classify(&document(virtual_idx, filler_idx));
            prop_assert_eq!(result.format, Virtual);
        }

        #[test]
        fn prop_virtual_near_address_is_hybrid(
            virtual_idx in 0..VIRTUAL_SENTENCES.len(),
            filler in 0..FILLER.len(),
        ) {
            let text = format!(
                "The meeting will be held at 1 Main Street, Chicago, IL 60601. {} {}",
                FILLER[filler],
                VIRTUAL_SENTENCES[virtual_idx],
            );
            prop_assert_eq!(classify(&text).format, Hybrid);
        }

        #[test]
        fn prop_snippet_is_verbatim(text in "[a-zA-Z ,.\n]{0,200}(held virtually|in person|hybrid meeting|webcast)[a-zA-Z ,.\n]{0,200}") {
            let result = classify(&text);
            let snippet = &result.snippet;
            prop_assert_eq!(&text[snippet.start..snippet.end], snippet.text.as_str());
        }
    }
}

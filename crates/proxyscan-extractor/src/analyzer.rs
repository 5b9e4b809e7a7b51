//! Combined meeting analysis

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::format::FormatClassifier;
use crate::location::LocationMatcher;
use crate::ExtractorError;
use proxyscan_core::{
    AnalysisConfig, ClassificationResult, Confidence, LocationMatchResult, MeetingFormat,
    TargetLocation,
};

/// Format and location verdicts for one filing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub classification: ClassificationResult,
    pub location: LocationMatchResult,
}

impl Analysis {
    /// Verdicts recorded when a filing's text could not be extracted
    pub fn parse_error(error: impl std::fmt::Display) -> Self {
        Self {
            classification: ClassificationResult::parse_error(&error),
            location: LocationMatchResult::not_applicable(format!("parse error: {error}")),
        }
    }
}

/// Runs the format classifier and the location matcher over the same text
pub struct MeetingAnalyzer {
    classifier: FormatClassifier,
    matcher: LocationMatcher,
    skip_location_for_virtual: bool,
}

impl MeetingAnalyzer {
    pub fn new(target: &TargetLocation, config: &AnalysisConfig) -> Result<Self, ExtractorError> {
        Ok(Self {
            classifier: FormatClassifier::new(config.clone()),
            matcher: LocationMatcher::new(target, config.clone())?,
            skip_location_for_virtual: config.skip_location_for_virtual,
        })
    }

    pub fn target(&self) -> &TargetLocation {
        self.matcher.target()
    }

    pub fn analyze(&self, text: &str) -> Analysis {
        let classification = self.classifier.classify(text);

        let location = if self.skip_location_for_virtual
            && classification.format == MeetingFormat::Virtual
            && classification.confidence >= Confidence::Medium
        {
            LocationMatchResult::not_applicable("virtual meeting has no physical location")
        } else {
            self.matcher.match_location(text)
        };

        debug!(
            format = %classification.format,
            format_confidence = %classification.confidence,
            location_matched = location.matched,
            location_confidence = %location.confidence,
            "analysis complete"
        );

        Analysis {
            classification,
            location,
        }
    }
}

//! proxyscan Extractor - Meeting-format and location signals
//!
//! Scans normalized proxy-statement text for:
//! - Meeting-format cues (hybrid, virtual, in-person) with confidence tiers
//! - The meeting location, matched against a target city and state
//!
//! Everything here is a pure function of the text and the configuration.

pub mod address;
pub mod analyzer;
pub mod format;
pub mod location;
pub mod snippet;
pub mod states;

pub use analyzer::{Analysis, MeetingAnalyzer};
pub use format::{CueSource, CueWeight, FormatClassifier, FormatCue, FORMAT_RULES};
pub use location::LocationMatcher;

use proxyscan_core::ScanError;
use thiserror::Error;

/// Errors raised while preparing extractors
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Target location cannot be searched for
    #[error("Invalid target location: {0}")]
    InvalidTarget(String),

    /// Pattern built from user input failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl From<ExtractorError> for ScanError {
    fn from(err: ExtractorError) -> Self {
        ScanError::Configuration(err.to_string())
    }
}

//! proxyscan Core - Domain models, traits, and shared types
//!
//! This crate defines the abstractions shared by every proxyscan crate:
//! - Filing identity and fetched documents
//! - Meeting-format and location verdicts with confidence tiers
//! - Report rows
//! - Common error types
//! - The `FilingSource` trait implemented by filing fetchers
//! - Configuration management

pub mod config;

pub use config::{
    AnalysisConfig, AppConfig, ConfigError, EdgarConfig, LoggingConfig, ScanConfig,
    DEFAULT_TICKERS,
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for proxyscan operations
///
/// The variants follow how a scan reacts to them: configuration and write
/// failures abort the run, fetch and parse failures only affect one filing.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Fetch error for {ticker}: {message}")]
    Fetch { ticker: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Report write error: {0}")]
    Write(String),
}

impl ScanError {
    /// Build a fetch error for a ticker
    pub fn fetch(ticker: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            ticker: ticker.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Write(_))
    }
}

impl From<ConfigError> for ScanError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

// ============================================================================
// Verdicts
// ============================================================================

/// Annual-meeting format of a filing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeetingFormat {
    InPerson,
    Virtual,
    Hybrid,
    #[default]
    Unknown,
}

impl MeetingFormat {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InPerson => "in-person",
            Self::Virtual => "virtual",
            Self::Hybrid => "hybrid",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for MeetingFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Qualitative strength of a decision
///
/// Ordered so that `None < Low < Medium < High`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A verbatim excerpt of normalized text
///
/// `text` always equals `normalized[start..end]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Snippet {
    /// An empty snippet anchored at the start of the text
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Meeting-format verdict for one filing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub format: MeetingFormat,
    pub confidence: Confidence,
    pub snippet: Snippet,
    /// Free-text annotation for manual review
    pub note: Option<String>,
}

impl ClassificationResult {
    /// No format signal found
    pub fn unknown(note: impl Into<String>) -> Self {
        Self {
            format: MeetingFormat::Unknown,
            confidence: Confidence::Low,
            snippet: Snippet::empty(),
            note: Some(note.into()),
        }
    }

    /// Result recorded for a filing whose text could not be extracted
    pub fn parse_error(error: impl std::fmt::Display) -> Self {
        Self::unknown(format!("parse error: {error}"))
    }
}

/// Location verdict for one filing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationMatchResult {
    pub matched: bool,
    pub confidence: Confidence,
    pub snippet: Snippet,
    pub note: Option<String>,
}

impl LocationMatchResult {
    /// Nothing location-related found
    pub fn none() -> Self {
        Self {
            matched: false,
            confidence: Confidence::None,
            snippet: Snippet::empty(),
            note: None,
        }
    }

    /// Location matching does not apply to this filing
    pub fn not_applicable(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::none()
        }
    }
}

/// City/state the user is looking for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLocation {
    pub city: String,
    pub state: Option<String>,
}

impl TargetLocation {
    /// Create a target, rejecting a blank city
    pub fn new(city: impl Into<String>, state: Option<String>) -> Result<Self> {
        let city = city.into().trim().to_string();
        if city.is_empty() {
            return Err(ScanError::Configuration(
                "target city must not be empty".to_string(),
            ));
        }

        let state = state
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self { city, state })
    }

    /// Filesystem-friendly name, e.g. `new_york_ny`
    pub fn slug(&self) -> String {
        let raw = match &self.state {
            Some(state) => format!("{}_{}", self.city, state),
            None => self.city.clone(),
        };

        raw.to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect::<String>()
            .trim_matches('_')
            .to_string()
    }
}

impl std::fmt::Display for TargetLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            Some(state) => write!(f, "{}, {}", self.city, state),
            None => write!(f, "{}", self.city),
        }
    }
}

// ============================================================================
// Filings
// ============================================================================

/// Inclusive range of filing dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> std::result::Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidValue {
                key: "date range".to_string(),
                value: format!("{start} is after {end}"),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse ISO `YYYY-MM-DD` bounds
    pub fn parse(start: &str, end: &str) -> std::result::Result<Self, ConfigError> {
        Self::new(parse_date("start-date", start)?, parse_date("end-date", end)?)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Whether two inclusive ranges share at least one day
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= end && start <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

fn parse_date(key: &str, value: &str) -> std::result::Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Identity of one DEF 14A filing on EDGAR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRef {
    pub ticker: String,
    pub cik: u64,
    /// Accession number with dashes, e.g. `0000320193-24-000010`
    pub accession_number: String,
    pub filing_date: NaiveDate,
    /// File name of the primary document within the filing
    pub primary_document: String,
}

impl FilingRef {
    /// Accession number as used in archive paths
    pub fn accession_no_dashes(&self) -> String {
        self.accession_number.replace('-', "")
    }
}

/// Raw bytes of a filing's primary document
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub filing: FilingRef,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A fetched filing together with its normalized text
#[derive(Debug, Clone)]
pub struct Filing {
    pub ticker: String,
    pub accession_number: String,
    pub filing_date: NaiveDate,
    pub document: String,
    pub raw: Vec<u8>,
    pub normalized_text: String,
}

impl Filing {
    pub fn new(document: FetchedDocument, normalized_text: String) -> Self {
        Self {
            ticker: document.filing.ticker,
            accession_number: document.filing.accession_number,
            filing_date: document.filing.filing_date,
            document: document.file_name,
            raw: document.bytes,
            normalized_text,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// One line of the output report
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub ticker: String,
    pub filing_date: NaiveDate,
    pub accession_number: String,
    pub document: String,
    pub classification: ClassificationResult,
    pub location: LocationMatchResult,
    pub target: TargetLocation,
    /// Approximate offset of the format snippet in the decoded source
    pub format_source_offset: Option<usize>,
    pub location_source_offset: Option<usize>,
    pub analyzed_at: DateTime<Utc>,
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for anything that can list and deliver DEF 14A filings
#[async_trait::async_trait]
pub trait FilingSource: Send + Sync {
    /// List DEF 14A filings for a ticker within a date range, oldest first
    async fn list_filings(&self, ticker: &str, range: &DateRange) -> Result<Vec<FilingRef>>;

    /// Retrieve the primary document of a filing
    async fn fetch_document(&self, filing: &FilingRef) -> Result<FetchedDocument>;

    /// Source name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

//! Sequential scan pipeline
//!
//! For each ticker in order: list filings, then fetch, normalize, analyze
//! and report each one. Fetch and parse failures stay local to a filing;
//! configuration and report failures end the run.

use std::fmt;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::report::ReportWriter;
use proxyscan_core::{
    DateRange, FetchedDocument, Filing, FilingSource, ReportRow, Result, ScanError, Snippet,
};
use proxyscan_extractor::{Analysis, MeetingAnalyzer};
use proxyscan_parser::{parse_document, NormalizedText};

/// Counters for one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub tickers: usize,
    /// Filings found in the date range
    pub listed: usize,
    /// Filings with a report row
    pub processed: usize,
    /// Filings that could not be fetched
    pub skipped: usize,
    /// Processed filings whose text could not be extracted
    pub parse_errors: usize,
    /// Rows with a location match
    pub matched: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tickers, {} filings listed, {} processed, {} skipped, {} parse errors, {} location matches",
            self.tickers, self.listed, self.processed, self.skipped, self.parse_errors, self.matched
        )
    }
}

/// One analyzed filing
#[derive(Debug)]
pub struct FilingOutcome {
    pub row: ReportRow,
    /// Set when the row was recorded without extracted text
    pub parse_error: Option<ScanError>,
}

pub struct ScanPipeline<S> {
    source: S,
    analyzer: MeetingAnalyzer,
    range: DateRange,
}

impl<S: FilingSource> ScanPipeline<S> {
    pub fn new(source: S, analyzer: MeetingAnalyzer, range: DateRange) -> Self {
        Self {
            source,
            analyzer,
            range,
        }
    }

    pub async fn run(&self, tickers: &[String], report: &mut ReportWriter) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        info!(
            source = self.source.name(),
            target = %self.analyzer.target(),
            range = %self.range,
            "starting scan"
        );

        for ticker in tickers {
            summary.tickers += 1;

            let filings = match self.source.list_filings(ticker, &self.range).await {
                Ok(filings) => filings,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "skipping ticker");
                    continue;
                }
            };
            info!(ticker = %ticker, count = filings.len(), "DEF 14A filings found");
            summary.listed += filings.len();

            for filing in filings {
                let doc = match self.source.fetch_document(&filing).await {
                    Ok(doc) => doc,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(
                            ticker = %ticker,
                            accession = %filing.accession_number,
                            error = %e,
                            "skipping filing"
                        );
                        summary.skipped += 1;
                        continue;
                    }
                };

                let outcome = self.analyze_document(doc);
                if let Some(error) = &outcome.parse_error {
                    warn!(
                        ticker = %ticker,
                        accession = %outcome.row.accession_number,
                        error = %error,
                        "could not extract filing text"
                    );
                    summary.parse_errors += 1;
                }

                report.write_row(&outcome.row)?;
                summary.processed += 1;
                if outcome.row.location.matched {
                    summary.matched += 1;
                }

                info!(
                    ticker = %ticker,
                    filing_date = %outcome.row.filing_date,
                    format = %outcome.row.classification.format,
                    confidence = %outcome.row.classification.confidence,
                    location_matched = outcome.row.location.matched,
                    "filing analyzed"
                );
            }
        }

        info!(%summary, "scan complete");
        Ok(summary)
    }

    /// Normalize and analyze one document; parse failures still yield a row
    pub fn analyze_document(&self, doc: FetchedDocument) -> FilingOutcome {
        let mut filing = Filing::new(doc, String::new());

        let (analysis, offsets, parse_error) = match parse_document(&filing.document, &filing.raw)
        {
            Ok(text) => {
                let analysis = self.analyzer.analyze(text.as_str());
                let offsets = (
                    source_offset(&text, &analysis.classification.snippet),
                    source_offset(&text, &analysis.location.snippet),
                );
                filing.normalized_text = text.into_string();
                debug!(
                    document = %filing.document,
                    raw_bytes = filing.raw.len(),
                    text_bytes = filing.normalized_text.len(),
                    "normalized filing text"
                );
                (analysis, offsets, None)
            }
            Err(e) => (
                Analysis::parse_error(&e),
                (None, None),
                Some(ScanError::Parse(e.to_string())),
            ),
        };

        let row = ReportRow {
            ticker: filing.ticker,
            filing_date: filing.filing_date,
            accession_number: filing.accession_number,
            document: filing.document,
            classification: analysis.classification,
            location: analysis.location,
            target: self.analyzer.target().clone(),
            format_source_offset: offsets.0,
            location_source_offset: offsets.1,
            analyzed_at: Utc::now(),
        };

        FilingOutcome { row, parse_error }
    }
}

fn source_offset(text: &NormalizedText, snippet: &Snippet) -> Option<usize> {
    if snippet.is_empty() {
        None
    } else {
        text.source_offset(snippet.start)
    }
}

//! CSV report writer
//!
//! One row per analyzed filing, flushed as it is written. An existing
//! non-empty report is appended to without repeating the header.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, SecondsFormat};
use serde::Serialize;
use tracing::info;

use proxyscan_core::{ReportRow, Result, ScanError};

/// Report header, in column order
pub const REPORT_COLUMNS: [&str; 17] = [
    "ticker",
    "filing_date",
    "meeting_format",
    "format_confidence",
    "format_snippet",
    "location_matched",
    "location_confidence",
    "location_snippet",
    "accession_number",
    "document",
    "target_city",
    "target_state",
    "format_note",
    "location_note",
    "format_source_offset",
    "location_source_offset",
    "analyzed_at",
];

/// Flat view of a [`ReportRow`]; field order is the column order
#[derive(Debug, Serialize)]
struct ReportRecord<'a> {
    ticker: &'a str,
    filing_date: NaiveDate,
    meeting_format: &'static str,
    format_confidence: &'static str,
    format_snippet: &'a str,
    location_matched: bool,
    location_confidence: &'static str,
    location_snippet: &'a str,
    accession_number: &'a str,
    document: &'a str,
    target_city: &'a str,
    target_state: Option<&'a str>,
    format_note: Option<&'a str>,
    location_note: Option<&'a str>,
    format_source_offset: Option<usize>,
    location_source_offset: Option<usize>,
    analyzed_at: String,
}

impl<'a> From<&'a ReportRow> for ReportRecord<'a> {
    fn from(row: &'a ReportRow) -> Self {
        Self {
            ticker: &row.ticker,
            filing_date: row.filing_date,
            meeting_format: row.classification.format.as_str(),
            format_confidence: row.classification.confidence.as_str(),
            format_snippet: &row.classification.snippet.text,
            location_matched: row.location.matched,
            location_confidence: row.location.confidence.as_str(),
            location_snippet: &row.location.snippet.text,
            accession_number: &row.accession_number,
            document: &row.document,
            target_city: &row.target.city,
            target_state: row.target.state.as_deref(),
            format_note: row.classification.note.as_deref(),
            location_note: row.location.note.as_deref(),
            format_source_offset: row.format_source_offset,
            location_source_offset: row.location_source_offset,
            analyzed_at: row.analyzed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

pub struct ReportWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl ReportWriter {
    /// Open a report, creating parent directories as needed
    pub fn open(path: &Path, overwrite: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
        }

        let existing_len = if overwrite {
            0
        } else {
            std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
        };

        let mut options = OpenOptions::new();
        options.create(true);
        if overwrite {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options.open(path).map_err(|e| write_error(path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if existing_len == 0 {
            writer
                .write_record(REPORT_COLUMNS)
                .map_err(|e| write_error(path, e))?;
            writer.flush().map_err(|e| write_error(path, e))?;
        } else {
            info!(path = %path.display(), "appending to existing report");
        }

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn write_row(&mut self, row: &ReportRow) -> Result<()> {
        self.writer
            .serialize(ReportRecord::from(row))
            .map_err(|e| write_error(&self.path, e))?;
        self.writer.flush().map_err(|e| write_error(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written through this writer
    pub fn rows_written(&self) -> usize {
        self.rows
    }
}

fn write_error(path: &Path, error: impl std::fmt::Display) -> ScanError {
    ScanError::Write(format!("{}: {error}", path.display()))
}

//! On-disk filing cache
//!
//! Layout: `<root>/<TICKER>/DEF 14A/<accession>/` holding the primary
//! document and a `filing.json` sidecar with the serialized [`FilingRef`].
//! Directories written by other downloaders (no sidecar, a
//! `full-submission.txt` with an SGML header) are read as well.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::{EdgarError, Result};
use proxyscan_core::{DateRange, FetchedDocument, FilingRef, FilingSource};

/// Directory name for the form type
pub const FORM_DIR: &str = "DEF 14A";

/// Sidecar file holding the serialized filing reference
pub const SIDECAR_FILE: &str = "filing.json";

/// Complete submission text file written by EDGAR bulk downloaders
pub const FULL_SUBMISSION_FILE: &str = "full-submission.txt";

/// Bytes of a submission file scanned for its SGML header
const HEADER_SCAN_LEN: usize = 8 * 1024;

/// Pick the primary document among a filing directory's file names
///
/// First HTML file that is not the filing-details page, else a text file
/// other than the full submission, else the full submission.
pub fn choose_primary_document(names: &[String]) -> Option<String> {
    names
        .iter()
        .find(|name| {
            let name = name.to_lowercase();
            (name.ends_with(".htm") || name.ends_with(".html")) && !name.contains("filing-details")
        })
        .or_else(|| {
            names.iter().find(|name| {
                name.to_lowercase().ends_with(".txt") && name.as_str() != FULL_SUBMISSION_FILE
            })
        })
        .or_else(|| names.iter().find(|name| name.as_str() == FULL_SUBMISSION_FILE))
        .cloned()
}

/// Fields read from an EDGAR SGML submission header
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SubmissionHeader {
    pub cik: Option<u64>,
    pub filed: Option<NaiveDate>,
}

pub fn parse_submission_header(bytes: &[u8]) -> SubmissionHeader {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(HEADER_SCAN_LEN)]);
    let field = |key: &str| {
        head.lines()
            .find_map(|line| line.trim().strip_prefix(key))
            .map(|value| value.trim().to_string())
    };

    SubmissionHeader {
        cik: field("CENTRAL INDEX KEY:").and_then(|v| v.parse().ok()),
        filed: field("FILED AS OF DATE:")
            .and_then(|v| NaiveDate::parse_from_str(&v, "%Y%m%d").ok()),
    }
}

/// Filing cache rooted at a directory
#[derive(Debug, Clone)]
pub struct FilingStore {
    root: PathBuf,
}

impl FilingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ticker_dir(&self, ticker: &str) -> PathBuf {
        self.root.join(ticker.to_uppercase()).join(FORM_DIR)
    }

    pub fn filing_dir(&self, ticker: &str, accession_number: &str) -> PathBuf {
        self.ticker_dir(ticker).join(accession_number)
    }

    /// Write a downloaded document and its sidecar; returns the document path
    pub async fn save(&self, doc: &FetchedDocument) -> Result<PathBuf> {
        let file_name = Path::new(&doc.file_name)
            .file_name()
            .ok_or_else(|| EdgarError::Malformed(format!("bad document name: {}", doc.file_name)))?;

        let dir = self.filing_dir(&doc.filing.ticker, &doc.filing.accession_number);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| EdgarError::io(&dir, e))?;

        let path = dir.join(file_name);
        tokio::fs::write(&path, &doc.bytes)
            .await
            .map_err(|e| EdgarError::io(&path, e))?;

        let sidecar = dir.join(SIDECAR_FILE);
        let metadata = serde_json::to_vec_pretty(&doc.filing)?;
        tokio::fs::write(&sidecar, metadata)
            .await
            .map_err(|e| EdgarError::io(&sidecar, e))?;

        debug!(path = %path.display(), "cached filing");
        Ok(path)
    }

    /// Cached document for a filing, if present
    pub async fn load(&self, filing: &FilingRef) -> Result<Option<FetchedDocument>> {
        let dir = self.filing_dir(&filing.ticker, &filing.accession_number);

        let named = dir.join(&filing.primary_document);
        let file_name = if !filing.primary_document.is_empty() && is_file(&named).await {
            filing.primary_document.clone()
        } else {
            match choose_primary_document(&list_files(&dir).await?) {
                Some(name) => name,
                None => return Ok(None),
            }
        };

        let path = dir.join(&file_name);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| EdgarError::io(&path, e))?;

        Ok(Some(FetchedDocument {
            filing: filing.clone(),
            file_name,
            bytes,
        }))
    }

    /// Cached filings for a ticker within a range, oldest first
    pub async fn list(&self, ticker: &str, range: &DateRange) -> Result<Vec<FilingRef>> {
        let dir = self.ticker_dir(ticker);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EdgarError::io(&dir, e)),
        };

        let mut filings = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EdgarError::io(&dir, e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let path = entry.path();

            match self.describe(ticker, &path).await {
                Ok(Some(filing)) if range.contains(filing.filing_date) => filings.push(filing),
                Ok(Some(_)) => {}
                Ok(None) => warn!(path = %path.display(), "cached filing has no filing date or document, skipping"),
                Err(e) => warn!(path = %path.display(), error = %e, "unreadable cached filing, skipping"),
            }
        }

        filings.sort_by(|a, b| {
            (a.filing_date, &a.accession_number).cmp(&(b.filing_date, &b.accession_number))
        });
        Ok(filings)
    }

    /// Filing reference for a cached directory, from its sidecar or its submission header
    async fn describe(&self, ticker: &str, dir: &Path) -> Result<Option<FilingRef>> {
        let sidecar = dir.join(SIDECAR_FILE);
        if is_file(&sidecar).await {
            let bytes = tokio::fs::read(&sidecar)
                .await
                .map_err(|e| EdgarError::io(&sidecar, e))?;
            return Ok(Some(serde_json::from_slice(&bytes)?));
        }

        let names = list_files(dir).await?;
        let Some(primary) = choose_primary_document(&names) else {
            return Ok(None);
        };

        let header_file = if names.iter().any(|n| n == FULL_SUBMISSION_FILE) {
            FULL_SUBMISSION_FILE
        } else {
            primary.as_str()
        };
        let header_path = dir.join(header_file);
        let bytes = tokio::fs::read(&header_path)
            .await
            .map_err(|e| EdgarError::io(&header_path, e))?;
        let header = parse_submission_header(&bytes);

        let Some(filing_date) = header.filed else {
            return Ok(None);
        };

        let accession_number = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(Some(FilingRef {
            ticker: ticker.to_uppercase(),
            cik: header.cik.unwrap_or_default(),
            accession_number,
            filing_date,
            primary_document: primary,
        }))
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Sorted file names in a directory, sidecar excluded; empty if the directory is missing
async fn list_files(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EdgarError::io(dir, e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| EdgarError::io(dir, e))?
    {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
            if name != SIDECAR_FILE {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Offline source over cached filings only
#[async_trait]
impl FilingSource for FilingStore {
    async fn list_filings(&self, ticker: &str, range: &DateRange) -> proxyscan_core::Result<Vec<FilingRef>> {
        self.list(ticker, range)
            .await
            .map_err(|e| e.into_scan_error(ticker))
    }

    async fn fetch_document(&self, filing: &FilingRef) -> proxyscan_core::Result<FetchedDocument> {
        let dir = self.filing_dir(&filing.ticker, &filing.accession_number);
        self.load(filing)
            .await
            .and_then(|doc| doc.ok_or_else(|| EdgarError::NoDocument(dir.display().to_string())))
            .map_err(|e| e.into_scan_error(&filing.ticker))
    }

    fn name(&self) -> &str {
        "filing-cache"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filing(accession: &str, date: (i32, u32, u32)) -> FilingRef {
        FilingRef {
            ticker: "AAPL".to_string(),
            cik: 320193,
            accession_number: accession.to_string(),
            filing_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            primary_document: "aapl-20240110.htm".to_string(),
        }
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::parse(start, end).unwrap()
    }

    #[test]
    fn test_choose_primary_document() {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(
            choose_primary_document(&names(&["filing-details.html", "full-submission.txt", "proxy.htm"])),
            Some("proxy.htm".to_string())
        );
        assert_eq!(
            choose_primary_document(&names(&["full-submission.txt", "d14a.txt"])),
            Some("d14a.txt".to_string())
        );
        assert_eq!(
            choose_primary_document(&names(&["full-submission.txt", "filing-details.xml"])),
            Some(FULL_SUBMISSION_FILE.to_string())
        );
        assert_eq!(choose_primary_document(&names(&["filing-details.html"])), None);
    }

    #[test]
    fn test_parse_submission_header() {
        let header = b"<SEC-HEADER>0000320193-24-000010.hdr.sgml : 20240111\n\
            ACCESSION NUMBER:\t\t0000320193-24-000010\n\
            CONFORMED SUBMISSION TYPE:\tDEF 14A\n\
            FILED AS OF DATE:\t\t20240111\n\
            \t\tCENTRAL INDEX KEY:\t\t\t0000320193\n";

        let parsed = parse_submission_header(header);
        assert_eq!(parsed.cik, Some(320193));
        assert_eq!(parsed.filed, NaiveDate::from_ymd_opt(2024, 1, 11));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilingStore::new(dir.path());
        let doc = FetchedDocument {
            filing: filing("0000320193-24-000010", (2024, 1, 10)),
            file_name: "aapl-20240110.htm".to_string(),
            bytes: b"<html><body>proxy</body></html>".to_vec(),
        };

        let path = store.save(&doc).await.unwrap();
        assert!(path.ends_with("AAPL/DEF 14A/0000320193-24-000010/aapl-20240110.htm"));

        let loaded = store.load(&doc.filing).await.unwrap().unwrap();
        assert_eq!(loaded.bytes, doc.bytes);
        assert_eq!(loaded.file_name, doc.file_name);

        let missing = filing("0000320193-23-000006", (2023, 1, 12));
        assert!(store.load(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilingStore::new(dir.path());
        for (accession, date) in [
            ("0000320193-24-000010", (2024, 1, 10)),
            ("0000320193-22-000005", (2022, 1, 7)),
            ("0000320193-23-000006", (2023, 1, 12)),
        ] {
            let doc = FetchedDocument {
                filing: filing(accession, date),
                file_name: "aapl-20240110.htm".to_string(),
                bytes: b"proxy".to_vec(),
            };
            store.save(&doc).await.unwrap();
        }

        let listed = store.list("aapl", &range("2023-01-01", "2024-12-31")).await.unwrap();
        let accessions: Vec<_> = listed.iter().map(|f| f.accession_number.as_str()).collect();
        assert_eq!(accessions, vec!["0000320193-23-000006", "0000320193-24-000010"]);

        assert!(store.list("MSFT", &range("2023-01-01", "2024-12-31")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_reads_directories_without_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilingStore::new(dir.path());
        let filing_dir = store.filing_dir("GS", "0000886982-24-000012");
        std::fs::create_dir_all(&filing_dir).unwrap();
        std::fs::write(
            filing_dir.join(FULL_SUBMISSION_FILE),
            "<SEC-HEADER>\nFILED AS OF DATE:\t\t20240315\nCENTRAL INDEX KEY:\t\t\t0000886982\n</SEC-HEADER>\n",
        )
        .unwrap();
        std::fs::write(filing_dir.join("primary-document.html"), "<p>proxy</p>").unwrap();

        let listed = store.list("GS", &range("2024-01-01", "2024-12-31")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].cik, 886982);
        assert_eq!(listed[0].primary_document, "primary-document.html");

        let doc = store.fetch_document(&listed[0]).await.unwrap();
        assert_eq!(doc.bytes, b"<p>proxy</p>");
    }

    #[tokio::test]
    async fn test_offline_fetch_of_missing_filing_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilingStore::new(dir.path());

        let err = store
            .fetch_document(&filing("0000320193-24-000010", (2024, 1, 10)))
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
    }
}

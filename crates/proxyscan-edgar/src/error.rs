//! EDGAR fetch and cache errors

use proxyscan_core::ScanError;
use thiserror::Error;

/// Errors from the EDGAR client and the filing cache
#[derive(Error, Debug)]
pub enum EdgarError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("EDGAR returned {status} for {url}")]
    Status { status: u16, url: String },

    /// Ticker missing from EDGAR's company list
    #[error("Ticker not found in EDGAR company list: {0}")]
    UnknownTicker(String),

    /// Response body did not have the expected shape
    #[error("Malformed EDGAR response: {0}")]
    Malformed(String),

    /// Filesystem failure in the filing cache
    #[error("Filing cache IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Unreadable cache sidecar
    #[error("Filing metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Cached filing directory without a usable document
    #[error("No primary document found in {0}")]
    NoDocument(String),

    /// Client cannot be built from the given settings
    #[error("Invalid EDGAR client configuration: {0}")]
    Config(String),
}

impl EdgarError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Per-filing fetch failure for the scan pipeline
    pub fn into_scan_error(self, ticker: &str) -> ScanError {
        match self {
            Self::Config(message) => ScanError::Configuration(message),
            other => ScanError::fetch(ticker, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, EdgarError>;

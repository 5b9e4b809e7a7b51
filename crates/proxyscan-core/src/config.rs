//! proxyscan Configuration Management
//!
//! Handles configuration from environment variables, config files,
//! and command-line arguments. Built-in defaults carry the standard
//! ticker set, date range and tuning constants for the text heuristics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tickers scanned when none are given on the command line
pub const DEFAULT_TICKERS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "META", "TSLA", "JPM", "GS", "BLK",
];

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// EDGAR access
    pub edgar: EdgarConfig,

    /// What to scan and where files go
    pub scan: ScanConfig,

    /// Classifier and matcher tuning
    pub analysis: AnalysisConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(email) = std::env::var("SEC_EMAIL") {
            let email = email.trim().to_string();
            if !email.is_empty() {
                config.edgar.contact_email = Some(email);
            }
        }
        if let Ok(ms) = std::env::var("PROXYSCAN_REQUEST_INTERVAL_MS") {
            config.edgar.request_interval_ms =
                ms.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "PROXYSCAN_REQUEST_INTERVAL_MS".to_string(),
                    value: ms,
                })?;
        }

        if let Ok(dir) = std::env::var("PROXYSCAN_FILINGS_DIR") {
            config.scan.filings_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("PROXYSCAN_OUTPUT_DIR") {
            config.scan.output_dir = PathBuf::from(dir);
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError { path, message },
            other => other,
        })
    }

    /// Parse a TOML document; missing sections fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;
        let defaults = Self::default();

        // Always use env for the contact address
        if env_config.edgar.contact_email.is_some() {
            self.edgar.contact_email = env_config.edgar.contact_email;
        }

        // Only override if env values differ from defaults
        if env_config.edgar.request_interval_ms != defaults.edgar.request_interval_ms {
            self.edgar.request_interval_ms = env_config.edgar.request_interval_ms;
        }
        if env_config.scan.filings_dir != defaults.scan.filings_dir {
            self.scan.filings_dir = env_config.scan.filings_dir;
        }
        if env_config.scan.output_dir != defaults.scan.output_dir {
            self.scan.output_dir = env_config.scan.output_dir;
        }
        if env_config.logging.level != defaults.logging.level {
            self.logging.level = env_config.logging.level;
        }

        Ok(self)
    }

    /// Validate the configuration before any network access
    pub fn validate(&self, require_email: bool) -> Result<(), ConfigError> {
        if require_email && self.edgar.contact_email.is_none() {
            return Err(ConfigError::MissingRequired(
                "SEC_EMAIL (contact email required by EDGAR's fair access policy)".to_string(),
            ));
        }

        if self.scan.tickers.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::MissingRequired("at least one ticker".to_string()));
        }

        if self.edgar.request_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "edgar.request_interval_ms".to_string(),
                value: "0".to_string(),
            });
        }

        self.analysis.validate()
    }
}

/// EDGAR client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgarConfig {
    /// Contact email sent in the User-Agent header
    pub contact_email: Option<String>,

    /// Application name sent in the User-Agent header
    pub user_agent_name: String,

    /// Minimum spacing between requests in milliseconds
    pub request_interval_ms: u64,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Base URL for archive documents and the ticker map
    pub www_base_url: String,

    /// Base URL for the submissions API
    pub data_base_url: String,
}

impl EdgarConfig {
    /// Loose sanity check on the contact address
    pub fn email_looks_valid(&self) -> bool {
        self.contact_email
            .as_deref()
            .and_then(|email| email.split_once('@'))
            .map(|(user, domain)| !user.is_empty() && domain.contains('.'))
            .unwrap_or(false)
    }

    /// User-Agent header value, e.g. `proxyscan jane@example.com`
    pub fn user_agent(&self) -> String {
        match &self.contact_email {
            Some(email) => format!("{} {}", self.user_agent_name, email),
            None => self.user_agent_name.clone(),
        }
    }
}

impl Default for EdgarConfig {
    fn default() -> Self {
        Self {
            contact_email: None,
            user_agent_name: "proxyscan".to_string(),
            // EDGAR allows 10 requests per second
            request_interval_ms: 110,
            timeout_secs: 30,
            www_base_url: "https://www.sec.gov".to_string(),
            data_base_url: "https://data.sec.gov".to_string(),
        }
    }
}

/// Scan inputs and file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Tickers to scan, in order
    pub tickers: Vec<String>,

    /// First filing date to include
    pub start_date: NaiveDate,

    /// Last filing date to include (today when unset)
    pub end_date: Option<NaiveDate>,

    /// Cache directory for downloaded filings
    pub filings_dir: PathBuf,

    /// Directory for report files
    pub output_dir: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            end_date: None,
            filings_dir: PathBuf::from("sec-edgar-filings"),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Tuning constants for the text heuristics
///
/// Window sizes are in bytes of normalized text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Context kept on each side of a matched cue
    pub snippet_context: usize,

    /// Hard cap on snippet length
    pub max_snippet_len: usize,

    /// Distance within which a second keyword corroborates a cue
    pub corroboration_window: usize,

    /// Distance within which virtual and physical cues make a hybrid
    pub hybrid_window: usize,

    /// Length of the window following a meeting-site keyword
    pub site_window: usize,

    /// Context added on each side of a bare address match
    pub address_window: usize,

    /// Suppress location verdicts for virtual-only meetings
    pub skip_location_for_virtual: bool,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_snippet_len == 0 {
            return Err(ConfigError::InvalidValue {
                key: "analysis.max_snippet_len".to_string(),
                value: "0".to_string(),
            });
        }
        if self.site_window == 0 {
            return Err(ConfigError::InvalidValue {
                key: "analysis.site_window".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            snippet_context: 150,
            max_snippet_len: 500,
            corroboration_window: 200,
            hybrid_window: 400,
            site_window: 250,
            address_window: 120,
            skip_location_for_virtual: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

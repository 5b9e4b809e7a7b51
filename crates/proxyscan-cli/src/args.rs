//! Command-line arguments

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::Parser;

use proxyscan_core::{AppConfig, ConfigError, DateRange, TargetLocation};

#[derive(Parser, Debug, Clone)]
#[command(name = "proxyscan")]
#[command(about = "Classify annual-meeting format and location in SEC DEF 14A filings")]
#[command(version)]
pub struct Cli {
    /// City the meeting location is matched against
    #[arg(long)]
    pub city: String,

    /// State name or two-letter code, sharpens the location match
    #[arg(long)]
    pub state: Option<String>,

    /// Tickers to scan, space- or comma-separated (replaces the default set)
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub tickers: Vec<String>,

    /// First filing date to include (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last filing date to include (YYYY-MM-DD, default today)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Report file; relative paths are placed under the output directory
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Truncate an existing report instead of appending to it
    #[arg(long)]
    pub overwrite: bool,

    /// Scan the filing cache only, without contacting EDGAR
    #[arg(long)]
    pub offline: bool,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub filings_dir: Option<PathBuf>,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Apply command-line values over file and environment settings
    pub fn apply(&self, config: &mut AppConfig) {
        let tickers = split_tickers(&self.tickers);
        if !tickers.is_empty() {
            config.scan.tickers = tickers;
        }
        if let Some(date) = self.start_date {
            config.scan.start_date = date;
        }
        if let Some(date) = self.end_date {
            config.scan.end_date = Some(date);
        }
        if let Some(dir) = &self.filings_dir {
            config.scan.filings_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.scan.output_dir = dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.log_json {
            config.logging.json_format = true;
        }
    }

    pub fn target(&self) -> proxyscan_core::Result<TargetLocation> {
        TargetLocation::new(self.city.as_str(), self.state.clone())
    }
}

/// Filing date range of a scan; an open end means today
pub fn date_range(config: &AppConfig) -> Result<DateRange, ConfigError> {
    let end = config
        .scan
        .end_date
        .unwrap_or_else(|| Utc::now().date_naive());
    DateRange::new(config.scan.start_date, end)
}

/// Upper-cased tickers in order, split on commas and whitespace, without repeats
pub fn split_tickers(values: &[String]) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for ticker in values
        .iter()
        .flat_map(|v| v.split(|c: char| c == ',' || c.is_whitespace()))
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
    {
        if !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

//! proxyscan CLI - Scan DEF 14A filings for annual-meeting logistics
//!
//! Wires configuration, the filing source, the analyzer and the report
//! writer together. The binary in `main.rs` is a thin wrapper around
//! [`run`].

pub mod args;
pub mod pipeline;
pub mod report;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub use args::Cli;
pub use pipeline::{FilingOutcome, RunSummary, ScanPipeline};
pub use report::{ReportWriter, REPORT_COLUMNS};

use proxyscan_core::{AppConfig, LoggingConfig, TargetLocation};
use proxyscan_edgar::{EdgarClient, FilingStore};
use proxyscan_extractor::MeetingAnalyzer;

/// Merge the config file, the environment and the command line, in that order
pub fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    let mut config = config.with_env_override()?;
    cli.apply(&mut config);
    Ok(config)
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
pub fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Report location: an explicit file (relative to the output directory
/// unless absolute) or a timestamped default name
pub fn output_path(
    output_dir: &Path,
    output_file: Option<&Path>,
    target: &TargetLocation,
    now: DateTime<Utc>,
) -> PathBuf {
    match output_file {
        Some(file) if file.is_absolute() => file.to_path_buf(),
        Some(file) => output_dir.join(file),
        None => output_dir.join(format!(
            "meeting_analysis_{}_{}.csv",
            target.slug(),
            now.format("%Y%m%d_%H%M%S")
        )),
    }
}

/// Run a scan; returns once every ticker has been processed
pub async fn run(cli: &Cli, config: AppConfig) -> anyhow::Result<RunSummary> {
    config.validate(!cli.offline)?;
    if !cli.offline && !config.edgar.email_looks_valid() {
        warn!(
            email = config.edgar.contact_email.as_deref().unwrap_or_default(),
            "SEC_EMAIL does not look like an email address"
        );
    }

    let target = cli.target()?;
    let range = args::date_range(&config)?;
    let analyzer = MeetingAnalyzer::new(&target, &config.analysis)?;

    let path = output_path(
        &config.scan.output_dir,
        cli.output_file.as_deref(),
        &target,
        Utc::now(),
    );
    let mut report = ReportWriter::open(&path, cli.overwrite)?;
    info!(path = %path.display(), "writing report");

    let store = FilingStore::new(&config.scan.filings_dir);
    let summary = if cli.offline {
        ScanPipeline::new(store, analyzer, range)
            .run(&config.scan.tickers, &mut report)
            .await?
    } else {
        let client = EdgarClient::new(&config.edgar)?.with_store(store);
        ScanPipeline::new(client, analyzer, range)
            .run(&config.scan.tickers, &mut report)
            .await?
    };

    info!(rows = report.rows_written(), path = %report.path().display(), "report written");
    Ok(summary)
}

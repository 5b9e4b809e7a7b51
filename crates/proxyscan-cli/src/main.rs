//! proxyscan - annual-meeting format and location from SEC DEF 14A filings
//!
//! Usage:
//!   proxyscan --city Chicago --state IL
//!   proxyscan --city "New York" --tickers JPM GS --start-date 2024-01-01
//!   proxyscan --city Cupertino --offline --filings-dir sec-edgar-filings

use clap::Parser;
use proxyscan_cli::{init_tracing, load_config, run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(&cli)?;
    init_tracing(&config.logging);

    let summary = run(&cli, config).await?;
    println!("Scan complete: {summary}");

    Ok(())
}

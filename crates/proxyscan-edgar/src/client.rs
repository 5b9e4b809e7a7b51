//! Rate-limited SEC EDGAR client
//!
//! Three endpoints are used:
//! - `www.sec.gov/files/company_tickers.json` for ticker to CIK lookup
//! - `data.sec.gov/submissions/CIK##########.json` for the filing index
//! - `www.sec.gov/Archives/edgar/data/...` for the documents themselves
//!
//! Every request waits on one governor limiter so the client never
//! exceeds EDGAR's fair-access rate.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{EdgarError, Result};
use crate::store::FilingStore;
use proxyscan_core::{DateRange, EdgarConfig, FetchedDocument, FilingRef, FilingSource};

/// Form type scanned
pub const FORM_TYPE: &str = "DEF 14A";

// ============================================================================
// Response Types
// ============================================================================

/// One entry of `company_tickers.json`
#[derive(Debug, Deserialize)]
pub struct CompanyTicker {
    pub cik_str: u64,
    pub ticker: String,
}

/// Column-oriented filing index, as served by the submissions API
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingColumns {
    #[serde(default)]
    pub accession_number: Vec<String>,
    #[serde(default)]
    pub filing_date: Vec<String>,
    #[serde(default)]
    pub form: Vec<String>,
    #[serde(default)]
    pub primary_document: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Submissions {
    pub filings: SubmissionFilings,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionFilings {
    pub recent: FilingColumns,
    /// Older filings, split into separately fetched pages
    #[serde(default)]
    pub files: Vec<SubmissionPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPage {
    pub name: String,
    pub filing_from: NaiveDate,
    pub filing_to: NaiveDate,
}

// ============================================================================
// Index Helpers
// ============================================================================

/// EDGAR spells share classes with a dash (`BRK-B`)
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase().replace('.', "-")
}

pub fn ticker_map(entries: HashMap<String, CompanyTicker>) -> HashMap<String, u64> {
    entries
        .into_values()
        .map(|entry| (normalize_ticker(&entry.ticker), entry.cik_str))
        .collect()
}

/// DEF 14A rows of a filing index that fall inside the range
pub fn select_filings(
    ticker: &str,
    cik: u64,
    columns: &FilingColumns,
    range: &DateRange,
) -> Vec<FilingRef> {
    let rows = columns
        .accession_number
        .iter()
        .zip(&columns.filing_date)
        .zip(&columns.form)
        .zip(&columns.primary_document);

    let mut filings = Vec::new();
    for (((accession, date), form), document) in rows {
        if form != FORM_TYPE || document.is_empty() {
            continue;
        }
        let Ok(filing_date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
            warn!(accession = %accession, date = %date, "unparseable filing date");
            continue;
        };
        if !range.contains(filing_date) {
            continue;
        }

        filings.push(FilingRef {
            ticker: ticker.to_uppercase(),
            cik,
            accession_number: accession.clone(),
            filing_date,
            primary_document: document.clone(),
        });
    }
    filings
}

/// Older index pages whose date span overlaps the range
pub fn pages_in_range<'a>(
    pages: &'a [SubmissionPage],
    range: &'a DateRange,
) -> impl Iterator<Item = &'a SubmissionPage> + 'a {
    pages
        .iter()
        .filter(move |page| range.overlaps(page.filing_from, page.filing_to))
}

pub fn submissions_url(data_base_url: &str, cik: u64) -> String {
    format!("{data_base_url}/submissions/CIK{cik:010}.json")
}

pub fn archive_url(www_base_url: &str, filing: &FilingRef) -> String {
    format!(
        "{}/Archives/edgar/data/{}/{}/{}",
        www_base_url,
        filing.cik,
        filing.accession_no_dashes(),
        filing.primary_document
    )
}

// ============================================================================
// Client
// ============================================================================

/// EDGAR HTTP client with a fixed request interval and a read-through cache
pub struct EdgarClient {
    http: Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    www_base_url: String,
    data_base_url: String,
    tickers: OnceCell<HashMap<String, u64>>,
    store: Option<FilingStore>,
}

impl EdgarClient {
    pub fn new(config: &EdgarConfig) -> Result<Self> {
        let quota = Quota::with_period(Duration::from_millis(config.request_interval_ms))
            .ok_or_else(|| {
                EdgarError::Config("request interval must be greater than zero".to_string())
            })?;

        let http = Client::builder()
            .user_agent(config.user_agent())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            limiter: RateLimiter::direct(quota),
            www_base_url: config.www_base_url.trim_end_matches('/').to_string(),
            data_base_url: config.data_base_url.trim_end_matches('/').to_string(),
            tickers: OnceCell::new(),
            store: None,
        })
    }

    /// Read documents from and write them to a filing cache
    pub fn with_store(mut self, store: FilingStore) -> Self {
        self.store = Some(store);
        self
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.limiter.until_ready().await;
        debug!(url, "EDGAR request");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EdgarError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get(url).await?.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| EdgarError::Malformed(format!("{url}: {e}")))
    }

    /// CIK for a ticker; the ticker map is fetched once per client
    pub async fn lookup_cik(&self, ticker: &str) -> Result<u64> {
        let tickers = self
            .tickers
            .get_or_try_init(|| async {
                let url = format!("{}/files/company_tickers.json", self.www_base_url);
                let entries: HashMap<String, CompanyTicker> = self.get_json(&url).await?;
                info!(count = entries.len(), "loaded EDGAR ticker map");
                Ok::<_, EdgarError>(ticker_map(entries))
            })
            .await?;

        tickers
            .get(&normalize_ticker(ticker))
            .copied()
            .ok_or_else(|| EdgarError::UnknownTicker(ticker.to_string()))
    }

    /// DEF 14A filings for a ticker within the range, oldest first
    pub async fn list_def14a(&self, ticker: &str, range: &DateRange) -> Result<Vec<FilingRef>> {
        let cik = self.lookup_cik(ticker).await?;
        let submissions: Submissions = self
            .get_json(&submissions_url(&self.data_base_url, cik))
            .await?;

        let mut filings = select_filings(ticker, cik, &submissions.filings.recent, range);
        for page in pages_in_range(&submissions.filings.files, range) {
            let url = format!("{}/submissions/{}", self.data_base_url, page.name);
            let columns: FilingColumns = self.get_json(&url).await?;
            filings.extend(select_filings(ticker, cik, &columns, range));
        }

        filings.sort_by(|a, b| {
            (a.filing_date, &a.accession_number).cmp(&(b.filing_date, &b.accession_number))
        });
        filings.dedup_by(|a, b| a.accession_number == b.accession_number);

        debug!(ticker, cik, count = filings.len(), "listed DEF 14A filings");
        Ok(filings)
    }

    /// Primary document of a filing, from the cache when present
    pub async fn download(&self, filing: &FilingRef) -> Result<FetchedDocument> {
        if let Some(store) = &self.store {
            match store.load(filing).await {
                Ok(Some(doc)) => {
                    debug!(accession = %filing.accession_number, "filing cache hit");
                    return Ok(doc);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "filing cache read failed, downloading"),
            }
        }

        let url = archive_url(&self.www_base_url, filing);
        let bytes = self.get(&url).await?.bytes().await?.to_vec();
        let doc = FetchedDocument {
            filing: filing.clone(),
            file_name: filing.primary_document.clone(),
            bytes,
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&doc).await {
                warn!(error = %e, "failed to cache filing");
            }
        }

        Ok(doc)
    }
}

#[async_trait]
impl FilingSource for EdgarClient {
    async fn list_filings(&self, ticker: &str, range: &DateRange) -> proxyscan_core::Result<Vec<FilingRef>> {
        self.list_def14a(ticker, range)
            .await
            .map_err(|e| e.into_scan_error(ticker))
    }

    async fn fetch_document(&self, filing: &FilingRef) -> proxyscan_core::Result<FetchedDocument> {
        self.download(filing)
            .await
            .map_err(|e| e.into_scan_error(&filing.ticker))
    }

    fn name(&self) -> &str {
        "edgar"
    }
}

// ============================================================================
// Tests
// ============================================================================

//! proxyscan EDGAR - Filing discovery and retrieval
//!
//! Two [`FilingSource`](proxyscan_core::FilingSource) implementations:
//! - [`EdgarClient`]: rate-limited access to SEC EDGAR with a
//!   read-through disk cache
//! - [`FilingStore`]: the disk cache alone, for offline scans

pub mod client;
pub mod error;
pub mod store;

pub use client::{normalize_ticker, EdgarClient, FORM_TYPE};
pub use error::{EdgarError, Result};
pub use store::{choose_primary_document, FilingStore};

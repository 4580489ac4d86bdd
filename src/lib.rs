//! fwfetch core library
//!
//! Reads firmware metadata catalogs (CSV), filters them by vendor, and
//! fetches the referenced images over HTTP(S) or anonymous FTP into a
//! `<vendor>/<product>` directory tree.
//!
//! - [`catalog`] - CSV ingestion and vendor filtering
//! - [`download`] - path layout, transports, retries and the download engine

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod download;
#[cfg(test)]
pub mod test_support;
mod user_agent;

pub use catalog::{CatalogError, FirmwareRecord, read_records, read_records_from_dir};
pub use download::{
    DEFAULT_CONCURRENCY, DownloadEngine, EngineError, FetchError, FetchOutcome, FtpClient,
    HttpClient, RetryPolicy, RunControl, RunReport, Transport, Transports,
};

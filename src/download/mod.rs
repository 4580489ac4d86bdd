//! Firmware retrieval: path layout, transports, retries and the engine.
//!
//! Each record becomes one job that lands at
//! `save_root/<vendor>/<product>/<filename-from-url>`. `ftp://` URLs go to
//! [`FtpClient`]; everything else goes to [`HttpClient`]. Both stream to
//! disk and never leave a partial file behind on failure.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use fwfetch_core::catalog::read_records;
//! use fwfetch_core::download::{
//!     DownloadEngine, FtpClient, HttpClient, RetryPolicy, RunControl, Transports,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let records = read_records(Path::new("tplink.csv"))?;
//! let transports = Transports::new(Arc::new(HttpClient::new()?), Arc::new(FtpClient::new()));
//! let engine = DownloadEngine::new(4, RetryPolicy::default())?;
//! let report = engine
//!     .run(&records, Path::new("fws"), &transports, &RunControl::new())
//!     .await?;
//! println!("{} of {} fetched", report.succeeded(), report.total());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;
mod ftp;
pub mod layout;
mod report;
mod retry;
mod transport;

pub use client::HttpClient;
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use engine::{
    DEFAULT_CONCURRENCY, DownloadEngine, EngineError, FetchJob, FetchOutcome, JobPlan,
    MAX_CONCURRENCY, MIN_CONCURRENCY, RunControl, RunReport, plan_jobs,
};
pub use error::{FetchError, FtpStage};
pub use ftp::{FtpClient, FtpTarget};
pub use report::{ReportError, render_report, write_report};
pub use retry::{
    FailureType, MAX_RETRIES_LIMIT, RetryDecision, RetryPolicy, classify_error,
};
pub use transport::{Fetcher, Transport, Transports};

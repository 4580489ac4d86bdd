//! Scheme-based transport selection.
//!
//! Only `ftp` is special-cased. Everything else, including unknown schemes
//! and strings that are not URLs at all, goes to the HTTP fetcher, whose
//! own error handling reports what it cannot reach.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use super::FetchError;

/// Transport used for one fetch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// HTTP, HTTPS and the fallback for every other scheme.
    Http,
    /// Anonymous FTP.
    Ftp,
}

impl Transport {
    /// Picks the transport for `url`.
    #[must_use]
    pub fn for_url(url: &str) -> Self {
        match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "ftp" => Self::Ftp,
            Ok(_) | Err(_) => Self::Http,
        }
    }

    /// Returns the stable label used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Ftp => "ftp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that can copy one remote resource into a local file.
///
/// Implementations must leave no file at `destination` when they return an
/// error, and must check `interrupted` between chunks.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` into `destination`, returning the number of bytes written.
    ///
    /// The destination's parent directory must already exist.
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        interrupted: &AtomicBool,
    ) -> Result<u64, FetchError>;
}

/// The pair of fetchers an engine dispatches to.
#[derive(Clone)]
pub struct Transports {
    http: Arc<dyn Fetcher>,
    ftp: Arc<dyn Fetcher>,
}

impl Transports {
    /// Creates a transport pair.
    pub fn new(http: Arc<dyn Fetcher>, ftp: Arc<dyn Fetcher>) -> Self {
        Self { http, ftp }
    }

    /// Returns the fetcher for a transport.
    #[must_use]
    pub fn fetcher(&self, transport: Transport) -> &Arc<dyn Fetcher> {
        match transport {
            Transport::Http => &self.http,
            Transport::Ftp => &self.ftp,
        }
    }
}

impl fmt::Debug for Transports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transports").finish_non_exhaustive()
    }
}

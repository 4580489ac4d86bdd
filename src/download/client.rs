//! HTTP(S) fetcher.
//!
//! [`HttpClient`] streams a response body to a destination file chunk by
//! chunk, so peak memory stays bounded regardless of image size.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use super::FetchError;
use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::layout::discard_destination;
use super::transport::Fetcher;
use crate::user_agent;

/// HTTP client for fetching firmware images with streaming support.
///
/// Create once and reuse: the underlying connection pool is shared by clones.
///
/// # Example
///
/// ```no_run
/// use fwfetch_core::download::HttpClient;
/// use std::path::Path;
/// use std::sync::atomic::AtomicBool;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// let interrupted = AtomicBool::new(false);
/// let bytes = client
///     .fetch_to_path("https://example.com/fw.zip", Path::new("./fw.zip"), &interrupted)
///     .await?;
/// println!("wrote {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default timeouts (30s connect, 300s read).
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeouts.
    ///
    /// The read timeout bounds each read, not the whole transfer, so slow but
    /// steady downloads of large images are not cut off.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self { client })
    }

    /// Fetches `url` into `destination`, returning the number of bytes written.
    ///
    /// The destination is created or overwritten. On any failure the
    /// destination is removed, so a failed fetch never leaves a truncated
    /// image behind.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] for connection, DNS, TLS, timeout and URL errors
    /// - [`FetchError::HttpStatus`] for non-success responses
    /// - [`FetchError::Filesystem`] when the file cannot be written
    /// - [`FetchError::Integrity`] when the body is shorter or longer than declared
    /// - [`FetchError::Cancelled`] when `interrupted` is set
    #[instrument(skip(self, interrupted), fields(url = %url, destination = %destination.display()))]
    pub async fn fetch_to_path(
        &self,
        url: &str,
        destination: &Path,
        interrupted: &AtomicBool,
    ) -> Result<u64, FetchError> {
        let result = self.fetch_inner(url, destination, interrupted).await;
        if result.is_err() {
            discard_destination(destination).await;
        }
        result
    }

    async fn fetch_inner(
        &self,
        url: &str,
        destination: &Path,
        interrupted: &AtomicBool,
    ) -> Result<u64, FetchError> {
        if interrupted.load(Ordering::SeqCst) {
            return Err(FetchError::cancelled(url));
        }
        debug!("sending GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let declared_length = response.content_length();
        let mut file = File::create(destination)
            .await
            .map_err(|e| FetchError::filesystem(destination, e))?;

        let bytes_written =
            stream_to_file(&mut file, response, url, destination, interrupted).await?;

        check_declared_length(destination, declared_length, bytes_written)?;

        info!(bytes = bytes_written, "fetched over HTTP");
        Ok(bytes_written)
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        interrupted: &AtomicBool,
    ) -> Result<u64, FetchError> {
        self.fetch_to_path(url, destination, interrupted).await
    }
}

/// Fails with [`FetchError::Integrity`] when a declared length was not met.
fn check_declared_length(
    destination: &Path,
    declared_length: Option<u64>,
    bytes_written: u64,
) -> Result<(), FetchError> {
    match declared_length {
        Some(expected) if expected != bytes_written => Err(FetchError::integrity(
            destination,
            expected,
            bytes_written,
        )),
        _ => Ok(()),
    }
}

/// Streams the response body to `file`, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    interrupted: &AtomicBool,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        if interrupted.load(Ordering::SeqCst) {
            debug!(bytes_written, "interrupted mid-transfer");
            return Err(FetchError::cancelled(url));
        }
        let chunk = chunk_result.map_err(|e| FetchError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::filesystem(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::filesystem(file_path, e))?;

    Ok(bytes_written)
}

//! Anonymous FTP fetcher.
//!
//! One control connection per job: connect, anonymous login, `CWD` to the
//! file's directory, binary mode, `RETR`, stream the data connection to disk,
//! confirm the transfer-complete reply, `QUIT`. Any failure removes the
//! destination file.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_ftp::types::FileType;
use async_ftp::{FtpError, FtpStream, status};
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, FTP_ANONYMOUS_PASSWORD, FTP_ANONYMOUS_USER, FTP_CHUNK_SIZE,
    FTP_DEFAULT_PORT, READ_TIMEOUT_SECS,
};
use super::layout::discard_destination;
use super::transport::Fetcher;
use super::{FetchError, FtpStage};

/// Where an FTP URL points: control endpoint, directory and file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpTarget {
    /// Server host name or address.
    pub host: String,
    /// Control port.
    pub port: u16,
    /// Directory to `CWD` into (decoded).
    pub directory: String,
    /// File to `RETR` (decoded).
    pub filename: String,
}

impl FtpTarget {
    /// Splits an `ftp://` URL into its parts.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the URL does not parse,
    /// has no host, or ends without a file name.
    pub fn parse(url: &str) -> Result<Self, String> {
        let parsed = Url::parse(url).map_err(|e| format!("invalid URL: {e}"))?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| "no host in URL".to_string())?
            .to_string();
        let port = parsed.port().unwrap_or(FTP_DEFAULT_PORT);

        let path = parsed.path();
        let (raw_dir, raw_file) = path.rsplit_once('/').unwrap_or(("", path));
        if raw_file.is_empty() {
            return Err("no file name in URL path".to_string());
        }
        let directory = if raw_dir.is_empty() {
            "/".to_string()
        } else {
            decode(raw_dir)?
        };

        Ok(Self {
            host,
            port,
            directory,
            filename: decode(raw_file)?,
        })
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn decode(raw: &str) -> Result<String, String> {
    urlencoding::decode(raw)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| format!("undecodable path segment {raw:?}: {e}"))
}

/// FTP client for anonymous binary retrieval.
///
/// Holds only timeouts; every fetch opens and closes its own connection.
#[derive(Debug, Clone)]
pub struct FtpClient {
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl Default for FtpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FtpClient {
    /// Creates a client with the default timeouts (30s connect, 300s per step).
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeouts.
    ///
    /// `io_timeout_secs` bounds every protocol command and every data read.
    #[must_use]
    pub fn with_timeouts(connect_timeout_secs: u64, io_timeout_secs: u64) -> Self {
        Self {
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            io_timeout: Duration::from_secs(io_timeout_secs),
        }
    }

    /// Fetches `url` into `destination`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Ftp`] for any protocol stage failure or timeout
    /// - [`FetchError::Filesystem`] when the file cannot be written
    /// - [`FetchError::Cancelled`] when `interrupted` is set
    ///
    /// On every error the destination file is removed.
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

        let target = FtpTarget::parse(url).map_err(|m| FetchError::ftp(url, FtpStage::Url, m))?;
        debug!(host = %target.host, port = target.port, dir = %target.directory, "connecting");

        let mut ftp = ftp_step(
            url,
            FtpStage::Connect,
            self.connect_timeout,
            FtpStream::connect(target.address()),
        )
        .await?;
        ftp_step(
            url,
            FtpStage::Login,
            self.io_timeout,
            ftp.login(FTP_ANONYMOUS_USER, FTP_ANONYMOUS_PASSWORD),
        )
        .await?;
        ftp_step(
            url,
            FtpStage::Cwd,
            self.io_timeout,
            ftp.cwd(&target.directory),
        )
        .await?;
        ftp_step(
            url,
            FtpStage::BinaryMode,
            self.io_timeout,
            ftp.transfer_type(FileType::Binary),
        )
        .await?;

        let mut data = ftp_step(
            url,
            FtpStage::Retrieve,
            self.io_timeout,
            ftp.get(&target.filename),
        )
        .await?;

        let mut file = File::create(destination)
            .await
            .map_err(|e| FetchError::filesystem(destination, e))?;
        let bytes_written = self
            .copy_data(&mut data, &mut file, url, destination, interrupted)
            .await?;
        drop(data);

        ftp_step(
            url,
            FtpStage::Retrieve,
            self.io_timeout,
            ftp.read_response_in(&[
                status::CLOSING_DATA_CONNECTION,
                status::REQUESTED_FILE_ACTION_OK,
            ]),
        )
        .await?;

        // The file is complete once the server confirmed the transfer.
        if let Err(error) = ftp.quit().await {
            warn!(%error, "QUIT failed after completed transfer");
        }

        info!(bytes = bytes_written, "fetched over FTP");
        Ok(bytes_written)
    }

    /// Copies the data connection into `file` in fixed-size chunks.
    async fn copy_data<R>(
        &self,
        data: &mut R,
        file: &mut File,
        url: &str,
        file_path: &Path,
        interrupted: &AtomicBool,
    ) -> Result<u64, FetchError>
    where
        R: AsyncRead + Unpin,
    {
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; FTP_CHUNK_SIZE];
        let mut bytes_written: u64 = 0;

        loop {
            if interrupted.load(Ordering::SeqCst) {
                debug!(bytes_written, "interrupted mid-transfer");
                return Err(FetchError::cancelled(url));
            }
            let read = match tokio::time::timeout(self.io_timeout, data.read(&mut buffer)).await {
                Ok(Ok(read)) => read,
                Ok(Err(e)) => return Err(FetchError::ftp(url, FtpStage::Retrieve, e)),
                Err(_) => {
                    return Err(FetchError::ftp(
                        url,
                        FtpStage::Retrieve,
                        timed_out(self.io_timeout),
                    ));
                }
            };
            if read == 0 {
                break;
            }
            writer
                .write_all(&buffer[..read])
                .await
                .map_err(|e| FetchError::filesystem(file_path, e))?;
            bytes_written += read as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| FetchError::filesystem(file_path, e))?;
        Ok(bytes_written)
    }
}

#[async_trait]
impl Fetcher for FtpClient {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        interrupted: &AtomicBool,
    ) -> Result<u64, FetchError> {
        self.fetch_to_path(url, destination, interrupted).await
    }
}

/// Runs one protocol step under a timeout, tagging failures with the stage.
async fn ftp_step<T, F>(
    url: &str,
    stage: FtpStage,
    limit: Duration,
    operation: F,
) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FtpError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(FetchError::ftp(url, stage, e)),
        Err(_) => Err(FetchError::ftp(url, stage, timed_out(limit))),
    }
}

fn timed_out(limit: Duration) -> String {
    format!("timed out after {}s", limit.as_secs())
}

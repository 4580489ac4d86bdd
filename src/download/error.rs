//! Error types for the download module.
//!
//! [`FetchError`] covers everything that can go wrong for a single fetch job.
//! It never escapes the engine as an `Err`: each one ends up inside the
//! job's [`FetchOutcome`](super::FetchOutcome). Batch-level failures live in
//! [`EngineError`](super::EngineError).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// FTP protocol stage at which a fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpStage {
    /// The URL could not be split into host, directory and file name.
    Url,
    /// Opening the control connection.
    Connect,
    /// Anonymous login.
    Login,
    /// Changing to the file's parent directory.
    Cwd,
    /// Switching the transfer type to binary.
    BinaryMode,
    /// `RETR` and the data transfer itself.
    Retrieve,
}

impl FtpStage {
    /// Returns the stable label used in messages and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Connect => "connect",
            Self::Login => "login",
            Self::Cwd => "cwd",
            Self::BinaryMode => "binary-mode",
            Self::Retrieve => "retrieve",
        }
    }
}

impl fmt::Display for FtpStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while fetching one firmware image.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL has no final path segment to use as a file name.
    #[error("could not determine filename from URL: {url}")]
    NoFilename {
        /// The offending URL.
        url: String,
    },

    /// Network-level error (DNS, connection refused, TLS, timeout, malformed URL).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Any FTP failure from connect through retrieve.
    #[error("FTP {stage} failed for {url}: {message}")]
    Ftp {
        /// The URL being retrieved.
        url: String,
        /// Protocol stage that failed.
        stage: FtpStage,
        /// Server or client error text.
        message: String,
    },

    /// Directory creation or file write failure.
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        /// Path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Bytes written differ from the length the server declared.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Destination that failed verification.
        path: PathBuf,
        /// Declared size in bytes.
        expected_bytes: u64,
        /// Bytes actually written.
        actual_bytes: u64,
    },

    /// Another job in the same run already resolved to this destination.
    #[error("destination {path} for {url} is already claimed by {claimed_by}")]
    DestinationConflict {
        /// The contested destination.
        path: PathBuf,
        /// URL of the rejected job.
        url: String,
        /// URL of the job that owns the destination.
        claimed_by: String,
    },

    /// The run was interrupted before or during this fetch.
    #[error("fetch of {url} cancelled")]
    Cancelled {
        /// The URL that was not (fully) fetched.
        url: String,
    },

    /// The task running this job panicked or was aborted.
    #[error("fetch task for {url} failed: {message}")]
    TaskFailed {
        /// The URL of the job.
        url: String,
        /// Join error text.
        message: String,
    },
}

impl FetchError {
    /// Creates a missing-filename error.
    pub fn no_filename(url: impl Into<String>) -> Self {
        Self::NoFilename { url: url.into() }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an FTP error for the given stage.
    pub fn ftp(url: impl Into<String>, stage: FtpStage, message: impl fmt::Display) -> Self {
        Self::Ftp {
            url: url.into(),
            stage,
            message: message.to_string(),
        }
    }

    /// Creates a filesystem error.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates a destination conflict error.
    pub fn destination_conflict(
        path: impl Into<PathBuf>,
        url: impl Into<String>,
        claimed_by: impl Into<String>,
    ) -> Self {
        Self::DestinationConflict {
            path: path.into(),
            url: url.into(),
            claimed_by: claimed_by.into(),
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates a task failure error.
    pub fn task_failed(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::TaskFailed {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Returns a stable machine-readable tag for this error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoFilename { .. } => "no_filename",
            Self::Network { .. } => "network",
            Self::HttpStatus { .. } => "http_status",
            Self::Ftp { .. } => "ftp",
            Self::Filesystem { .. } => "filesystem",
            Self::Integrity { .. } => "integrity",
            Self::DestinationConflict { .. } => "destination_conflict",
            Self::Cancelled { .. } => "cancelled",
            Self::TaskFailed { .. } => "task_failed",
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path the source error does not carry.

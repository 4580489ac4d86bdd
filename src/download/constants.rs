//! Constants for the download module (timeouts, buffer sizes, FTP defaults).

/// Default connect timeout for HTTP and FTP (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default read timeout (5 minutes, firmware images can be large and slow).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Chunk size for copying FTP data connections to disk.
pub const FTP_CHUNK_SIZE: usize = 8192;

/// Default FTP control port.
pub const FTP_DEFAULT_PORT: u16 = 21;

/// Anonymous FTP user name.
pub const FTP_ANONYMOUS_USER: &str = "anonymous";

/// Anonymous FTP password, by convention an email-like string.
pub const FTP_ANONYMOUS_PASSWORD: &str = "anonymous@";

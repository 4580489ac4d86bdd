//! Machine-readable run report.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::engine::{FetchOutcome, RunReport};
use super::transport::Transport;
use crate::catalog::FirmwareRecord;

/// Errors writing a report file.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The report could not be serialized.
    #[error("cannot serialize run report: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The report file could not be written.
    #[error("cannot write run report {path}: {source}")]
    Io {
        /// Report path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    save_root: &'a Path,
    total: usize,
    succeeded: usize,
    failed: usize,
    duplicates: usize,
    interrupted: bool,
    bytes_written: u64,
    outcomes: Vec<OutcomeEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct OutcomeEntry<'a> {
    #[serde(flatten)]
    record: &'a FirmwareRecord,
    destination: Option<&'a Path>,
    transport: Option<Transport>,
    attempts: u32,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a FetchOutcome> for OutcomeEntry<'a> {
    fn from(outcome: &'a FetchOutcome) -> Self {
        let (bytes, error_kind, error) = match &outcome.result {
            Ok(bytes) => (Some(*bytes), None, None),
            Err(e) => (None, Some(e.kind()), Some(e.to_string())),
        };
        Self {
            record: &outcome.record,
            destination: outcome.destination.as_deref(),
            transport: outcome.transport,
            attempts: outcome.attempts,
            success: outcome.is_success(),
            bytes,
            error_kind,
            error,
        }
    }
}

/// Renders `report` as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ReportError::Serialize`] if serialization fails.
pub fn render_report(report: &RunReport, save_root: &Path) -> Result<String, ReportError> {
    let document = ReportDocument {
        save_root,
        total: report.total(),
        succeeded: report.succeeded(),
        failed: report.failed(),
        duplicates: report.duplicates,
        interrupted: report.interrupted,
        bytes_written: report.bytes_written(),
        outcomes: report.outcomes.iter().map(OutcomeEntry::from).collect(),
    };
    serde_json::to_string_pretty(&document).map_err(ReportError::Serialize)
}

/// Writes the JSON report to `path`.
///
/// # Errors
///
/// Returns [`ReportError`] if rendering or writing fails.
pub async fn write_report(
    report: &RunReport,
    save_root: &Path,
    path: &Path,
) -> Result<(), ReportError> {
    let json = render_report(report, save_root)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), "wrote run report");
    Ok(())
}

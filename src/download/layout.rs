//! Destination layout: `save_root/<vendor>/<product>/<filename-from-url>`.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use url::Url;

use crate::catalog::FirmwareRecord;

/// Placeholder for a segment that is empty after sanitizing.
pub const UNKNOWN_SEGMENT: &str = "unknown";

/// Turns free text (vendor, product) into one safe path segment.
///
/// Reserved characters (`< > : " / \ | ? *`) and control characters become
/// `_`. Surrounding whitespace and dots are trimmed, so the result can never
/// be `.` or `..`. Empty results fall back to [`UNKNOWN_SEGMENT`].
#[must_use]
pub fn sanitize_path_segment(value: &str) -> String {
    let replaced = replace_reserved(value);
    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if trimmed.is_empty() {
        UNKNOWN_SEGMENT.to_string()
    } else {
        trimmed.to_string()
    }
}

fn replace_reserved(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Returns the final path segment of `url`, or `None` when it is empty.
///
/// Query strings and fragments are not part of the name. Strings that do not
/// parse as URLs fall back to a plain split on `/`.
#[must_use]
pub fn filename_from_url(url: &str) -> Option<String> {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string)?,
        Err(_) => {
            let without_suffix = url.split(['?', '#']).next().unwrap_or_default();
            without_suffix
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string()
        }
    };

    let decoded = urlencoding::decode(&segment).map_or_else(|_| segment.clone(), Cow::into_owned);
    let name = replace_reserved(&decoded);
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name)
    }
}

/// Directory a record's files land in: `save_root/<vendor>/<product>`.
#[must_use]
pub fn record_dir(save_root: &Path, record: &FirmwareRecord) -> PathBuf {
    save_root
        .join(sanitize_path_segment(&record.vendor))
        .join(sanitize_path_segment(&record.product))
}

/// Full destination for a record, or `None` when its URL has no filename.
#[must_use]
pub fn destination_for(save_root: &Path, record: &FirmwareRecord) -> Option<PathBuf> {
    let filename = filename_from_url(&record.url)?;
    Some(record_dir(save_root, record).join(filename))
}

/// Removes whatever a failed fetch left at `destination`.
pub(crate) async fn discard_destination(destination: &Path) {
    match tokio::fs::remove_file(destination).await {
        Ok(()) => debug!(path = %destination.display(), "removed partial file after error"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            path = %destination.display(),
            error = %e,
            "could not remove partial file"
        ),
    }
}

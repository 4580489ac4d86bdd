//! Vendor filtering of firmware catalogs.
//!
//! Matching is a case-insensitive comparison of the whole, trimmed `vendor`
//! cell against each keyword: `ZYXEL` matches `Zyxel` but not `Zyxel Inc`.
//! Filtered files keep the input header and rows byte-for-byte as parsed.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{StringRecord, Writer};
use tracing::{debug, info, instrument};

use super::{CatalogError, FirmwareRecord, VENDOR_COLUMN};
use crate::download::layout::sanitize_path_segment;

/// Suffix of the per-vendor output files.
pub const OUTPUT_SUFFIX: &str = "_firmware_download_list.csv";

/// Normalizes vendor keywords: trimmed, lowercased, empty ones and repeats dropped.
///
/// # Errors
///
/// Returns [`CatalogError::NoVendors`] when nothing is left.
pub fn normalize_vendors<I, S>(vendors: I) -> Result<Vec<String>, CatalogError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for vendor in vendors {
        let key = vendor.as_ref().trim().to_lowercase();
        if !key.is_empty() && !normalized.contains(&key) {
            normalized.push(key);
        }
    }
    if normalized.is_empty() {
        return Err(CatalogError::NoVendors);
    }
    Ok(normalized)
}

/// Output file name for a vendor keyword.
#[must_use]
pub fn vendor_output_filename(vendor: &str) -> String {
    format!("{}{OUTPUT_SUFFIX}", sanitize_path_segment(vendor.trim()))
}

/// Set of normalized vendor keywords.
#[derive(Debug, Clone)]
pub struct VendorFilter {
    keys: Vec<String>,
}

impl VendorFilter {
    /// Builds a filter from raw keywords.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NoVendors`] when every keyword is blank.
    pub fn new<I, S>(vendors: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            keys: normalize_vendors(vendors)?,
        })
    }

    /// Normalized keywords, in the order given.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Returns the matching keyword for a vendor cell, if any.
    #[must_use]
    pub fn key_for(&self, vendor_cell: &str) -> Option<&str> {
        let candidate = vendor_cell.trim().to_lowercase();
        self.keys
            .iter()
            .find(|key| **key == candidate)
            .map(String::as_str)
    }

    /// Returns true when the vendor cell matches one of the keywords.
    #[must_use]
    pub fn matches(&self, vendor_cell: &str) -> bool {
        self.key_for(vendor_cell).is_some()
    }

    /// Keeps only the records whose vendor matches.
    #[must_use]
    pub fn apply(&self, records: Vec<FirmwareRecord>) -> Vec<FirmwareRecord> {
        records
            .into_iter()
            .filter(|record| self.matches(&record.vendor))
            .collect()
    }
}

/// Rows written for one vendor keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorCount {
    /// Normalized keyword.
    pub vendor: String,
    /// File the rows were written to.
    pub path: PathBuf,
    /// Number of data rows written (header excluded).
    pub rows: usize,
}

struct CatalogReader {
    reader: csv::Reader<File>,
    headers: StringRecord,
    vendor_index: usize,
}

fn open_catalog(input: &Path) -> Result<CatalogReader, CatalogError> {
    let file = File::open(input).map_err(|e| CatalogError::io(input, e))?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = reader
        .headers()
        .map_err(|e| CatalogError::csv(input, e))?
        .clone();
    let vendor_index = headers
        .iter()
        .position(|h| h.trim() == VENDOR_COLUMN)
        .ok_or_else(|| CatalogError::missing_column(input, VENDOR_COLUMN))?;
    Ok(CatalogReader {
        reader,
        headers,
        vendor_index,
    })
}

fn create_writer(path: &Path, headers: &StringRecord) -> Result<Writer<File>, CatalogError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| CatalogError::csv(path, e))?;
    writer
        .write_record(headers)
        .map_err(|e| CatalogError::csv(path, e))?;
    Ok(writer)
}

/// Writes the rows of `input` whose vendor matches `vendor` to `output`.
///
/// Returns the number of data rows written.
///
/// # Errors
///
/// Returns [`CatalogError::NoVendors`] for a blank keyword,
/// [`CatalogError::MissingColumn`] when the input has no `vendor` column,
/// and IO/CSV errors for unreadable input or unwritable output.
#[instrument(fields(input = %input.display(), output = %output.display()))]
pub fn filter_single_vendor(
    input: &Path,
    output: &Path,
    vendor: &str,
) -> Result<usize, CatalogError> {
    let filter = VendorFilter::new([vendor])?;
    let mut catalog = open_catalog(input)?;
    let mut writer = create_writer(output, &catalog.headers)?;

    let mut written = 0;
    for row in catalog.reader.records() {
        let row = row.map_err(|e| CatalogError::csv(input, e))?;
        let cell = row.get(catalog.vendor_index).unwrap_or_default();
        if filter.matches(cell) {
            writer
                .write_record(&row)
                .map_err(|e| CatalogError::csv(output, e))?;
            written += 1;
        }
    }
    writer.flush().map_err(|e| CatalogError::io(output, e))?;

    info!(rows = written, "filtered catalog written");
    Ok(written)
}

/// Splits `input` into one file per vendor keyword under `output_dir`, in one pass.
///
/// Every keyword gets a file (header only when nothing matched). Results are
/// returned in keyword order.
///
/// # Errors
///
/// Same as [`filter_single_vendor`], plus [`CatalogError::Io`] when
/// `output_dir` cannot be created.
#[instrument(skip(vendors), fields(input = %input.display(), output_dir = %output_dir.display()))]
pub fn filter_multi_vendor<I, S>(
    input: &Path,
    output_dir: &Path,
    vendors: I,
) -> Result<Vec<VendorCount>, CatalogError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let filter = VendorFilter::new(vendors)?;
    let mut catalog = open_catalog(input)?;
    std::fs::create_dir_all(output_dir).map_err(|e| CatalogError::io(output_dir, e))?;

    let mut writers: HashMap<&str, (Writer<File>, PathBuf, usize)> = HashMap::new();
    for key in filter.keys() {
        let path = output_dir.join(vendor_output_filename(key));
        let writer = create_writer(&path, &catalog.headers)?;
        debug!(vendor = %key, path = %path.display(), "opened vendor output");
        writers.insert(key.as_str(), (writer, path, 0));
    }

    for row in catalog.reader.records() {
        let row = row.map_err(|e| CatalogError::csv(input, e))?;
        let cell = row.get(catalog.vendor_index).unwrap_or_default();
        if let Some(key) = filter.key_for(cell)
            && let Some((writer, path, count)) = writers.get_mut(key)
        {
            writer
                .write_record(&row)
                .map_err(|e| CatalogError::csv(path.as_path(), e))?;
            *count += 1;
        }
    }

    let mut counts = Vec::with_capacity(filter.keys().len());
    for key in filter.keys() {
        if let Some((mut writer, path, rows)) = writers.remove(key.as_str()) {
            writer.flush().map_err(|e| CatalogError::io(&path, e))?;
            counts.push(VendorCount {
                vendor: key.clone(),
                path,
                rows,
            });
        }
    }

    info!(vendors = counts.len(), "vendor split complete");
    Ok(counts)
}

//! Firmware catalog ingestion.
//!
//! Catalogs are CSV files with a header row naming (at least) a `url` column
//! and usually `vendor`, `product`, `version` and `date`. Columns are matched
//! by name, cells are trimmed, and rows without a URL are skipped.
//!
//! # Example
//!
//! ```no_run
//! use fwfetch_core::catalog::read_records_from_dir;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let load = read_records_from_dir(Path::new("routers"))?;
//! println!("{} records from {} files", load.records.len(), load.files_read);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod filter;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

pub use error::CatalogError;
pub use filter::{VendorFilter, filter_multi_vendor, filter_single_vendor, normalize_vendors};

/// Name of the column that carries the download URL.
pub const URL_COLUMN: &str = "url";

/// Name of the column that carries the vendor.
pub const VENDOR_COLUMN: &str = "vendor";

/// One catalog row describing a downloadable firmware image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmwareRecord {
    /// Vendor name as written in the catalog.
    pub vendor: String,
    /// Product / model name.
    pub product: String,
    /// Firmware version string.
    pub version: String,
    /// Release date as written in the catalog.
    pub date: String,
    /// Download URL.
    pub url: String,
}

/// Records gathered from a directory of catalogs.
#[derive(Debug, Default)]
pub struct CatalogLoad {
    /// All records, in file-name order then row order.
    pub records: Vec<FirmwareRecord>,
    /// Number of CSV files read successfully.
    pub files_read: usize,
    /// Files that could not be read, with the reason.
    pub failures: Vec<(PathBuf, CatalogError)>,
}

/// Column positions resolved from a header row.
struct Columns {
    vendor: Option<usize>,
    product: Option<usize>,
    version: Option<usize>,
    date: Option<usize>,
    url: usize,
}

impl Columns {
    fn resolve(headers: &StringRecord, path: &Path) -> Result<Self, CatalogError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let url = find(URL_COLUMN).ok_or_else(|| CatalogError::missing_column(path, URL_COLUMN))?;
        Ok(Self {
            vendor: find(VENDOR_COLUMN),
            product: find("product"),
            version: find("version"),
            date: find("date"),
            url,
        })
    }

    fn record(&self, row: &StringRecord) -> Option<FirmwareRecord> {
        let cell = |index: Option<usize>| {
            index
                .and_then(|i| row.get(i))
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };
        let url = cell(Some(self.url));
        if url.is_empty() {
            return None;
        }
        Some(FirmwareRecord {
            vendor: cell(self.vendor),
            product: cell(self.product),
            version: cell(self.version),
            date: cell(self.date),
            url,
        })
    }
}

/// Reads firmware records from any CSV source.
///
/// `path` is only used for error messages.
///
/// # Errors
///
/// Returns [`CatalogError::MissingColumn`] when there is no `url` column and
/// [`CatalogError::Csv`] for malformed content.
pub fn read_records_from_reader<R: Read>(
    reader: R,
    path: &Path,
) -> Result<Vec<FirmwareRecord>, CatalogError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader
        .headers()
        .map_err(|e| CatalogError::csv(path, e))?
        .clone();
    let columns = Columns::resolve(&headers, path)?;

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row.map_err(|e| CatalogError::csv(path, e))?;
        if let Some(record) = columns.record(&row) {
            records.push(record);
        }
    }
    Ok(records)
}

/// Reads firmware records from one CSV file.
///
/// # Errors
///
/// Returns [`CatalogError::Io`] when the file cannot be opened, plus the
/// errors of [`read_records_from_reader`].
#[instrument(fields(path = %path.display()))]
pub fn read_records(path: &Path) -> Result<Vec<FirmwareRecord>, CatalogError> {
    let file = File::open(path).map_err(|e| CatalogError::io(path, e))?;
    let records = read_records_from_reader(file, path)?;
    info!(count = records.len(), "read firmware records");
    Ok(records)
}

/// Lists `*.csv` files in `dir`, sorted by name.
///
/// # Errors
///
/// Returns [`CatalogError::Io`] when the directory cannot be listed.
pub fn csv_files_in(dir: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let entries = std::fs::read_dir(dir).map_err(|e| CatalogError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CatalogError::io(dir, e))?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Reads and concatenates every `*.csv` catalog in `dir`.
///
/// A file that fails to read is logged, recorded in
/// [`CatalogLoad::failures`] and skipped.
///
/// # Errors
///
/// Returns [`CatalogError::NoCsvFiles`] when the directory has no catalogs,
/// or [`CatalogError::Io`] when it cannot be listed.
#[instrument(fields(dir = %dir.display()))]
pub fn read_records_from_dir(dir: &Path) -> Result<CatalogLoad, CatalogError> {
    let files = csv_files_in(dir)?;
    if files.is_empty() {
        return Err(CatalogError::NoCsvFiles {
            dir: dir.to_path_buf(),
        });
    }
    debug!(files = files.len(), "found catalog files");

    let mut load = CatalogLoad::default();
    for file in files {
        match read_records(&file) {
            Ok(records) => {
                load.records.extend(records);
                load.files_read += 1;
            }
            Err(error) => {
                warn!(path = %file.display(), %error, "skipping unreadable catalog");
                load.failures.push((file, error));
            }
        }
    }

    info!(
        records = load.records.len(),
        files = load.files_read,
        skipped_files = load.failures.len(),
        "catalog loaded"
    );
    Ok(load)
}

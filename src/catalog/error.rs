//! Error types for catalog ingestion and vendor filtering.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or filtering firmware catalogs.
///
/// All of these are batch-level: they are reported before any fetch starts.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The input directory holds no `*.csv` files.
    #[error("no CSV files found in {dir}")]
    NoCsvFiles {
        /// The directory that was searched.
        dir: PathBuf,
    },

    /// A required column is missing from the header row.
    #[error("{path} is missing the `{column}` column")]
    MissingColumn {
        /// The CSV file.
        path: PathBuf,
        /// Name of the missing column.
        column: &'static str,
    },

    /// Every vendor keyword was empty after trimming.
    #[error("vendor keyword must not be empty")]
    NoVendors,

    /// Opening, listing or creating a file or directory failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV content.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// The CSV file.
        path: PathBuf,
        /// The underlying parser error.
        #[source]
        source: csv::Error,
    },
}

impl CatalogError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a CSV error.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Creates a missing-column error.
    pub fn missing_column(path: impl Into<PathBuf>, column: &'static str) -> Self {
        Self::MissingColumn {
            path: path.into(),
            column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_display() {
        let error = CatalogError::missing_column("/data/list.csv", "vendor");
        let msg = error.to_string();
        assert!(msg.contains("/data/list.csv"), "Expected path in: {msg}");
        assert!(msg.contains("`vendor`"), "Expected column in: {msg}");
    }

    #[test]
    fn test_no_csv_files_display() {
        let error = CatalogError::NoCsvFiles {
            dir: PathBuf::from("routers"),
        };
        assert!(error.to_string().contains("routers"));
    }
}

//! `fwfetch filter`: split a catalog by vendor keyword.

use std::path::PathBuf;

use anyhow::{Context, Result};
use fwfetch_core::catalog::filter::vendor_output_filename;
use fwfetch_core::catalog::{filter_multi_vendor, filter_single_vendor};
use tracing::debug;

use crate::ProcessExit;
use crate::cli::FilterArgs;

pub(crate) fn run_filter(args: &FilterArgs) -> Result<ProcessExit> {
    if let Some(vendor) = &args.vendor {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(vendor_output_filename(vendor)));
        debug!(vendor = %vendor, output = %output.display(), "filtering single vendor");

        let rows = filter_single_vendor(&args.input, &output, vendor).with_context(|| {
            format!(
                "Failed to filter '{}' for vendor '{vendor}'",
                args.input.display()
            )
        })?;
        println!(
            "Wrote {rows} row(s) for vendor '{}' to {}",
            vendor.trim(),
            output.display()
        );
        return Ok(ProcessExit::Success);
    }

    let counts = filter_multi_vendor(&args.input, &args.output_dir, &args.vendors)
        .with_context(|| format!("Failed to filter '{}' by vendors", args.input.display()))?;
    for count in &counts {
        println!(
            "Wrote {} row(s) for vendor '{}' to {}",
            count.rows,
            count.vendor,
            count.path.display()
        );
    }
    Ok(ProcessExit::Success)
}

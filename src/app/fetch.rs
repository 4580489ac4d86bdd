//! `fwfetch fetch`: load catalogs, plan, fetch, report.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use fwfetch_core::catalog::{VendorFilter, read_records, read_records_from_dir};
use fwfetch_core::download::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, DownloadEngine, FetchOutcome, FtpClient,
    HttpClient, JobPlan, READ_TIMEOUT_SECS, RetryPolicy, RunControl, RunReport, Transports,
    plan_jobs, write_report,
};
use fwfetch_core::FirmwareRecord;
use tracing::{debug, info, warn};

use super::config::FileConfig;
use super::{exit_handler, progress, terminal};
use crate::ProcessExit;
use crate::cli::FetchArgs;

/// Save root used when neither the CLI nor the config file sets one.
pub(crate) const DEFAULT_SAVE_ROOT: &str = "fws";

/// Effective fetch settings after merging CLI flags, config file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchSettings {
    pub save_root: PathBuf,
    pub concurrency: usize,
    pub max_retries: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl FetchSettings {
    pub(crate) fn resolve(args: &FetchArgs, config: &FileConfig) -> Self {
        Self {
            save_root: args
                .save_root
                .clone()
                .or_else(|| config.save_root.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_ROOT)),
            concurrency: args
                .concurrency
                .or(config.concurrency)
                .map_or(DEFAULT_CONCURRENCY, usize::from),
            max_retries: args
                .max_retries
                .or(config.max_retries)
                .map_or(0, u32::from),
            connect_timeout_secs: args
                .connect_timeout
                .or(config.connect_timeout_secs)
                .unwrap_or(CONNECT_TIMEOUT_SECS),
            read_timeout_secs: args
                .read_timeout
                .or(config.read_timeout_secs)
                .unwrap_or(READ_TIMEOUT_SECS),
        }
    }
}

pub(crate) async fn run_fetch(
    args: &FetchArgs,
    config: &FileConfig,
    quiet: bool,
) -> Result<ProcessExit> {
    let settings = FetchSettings::resolve(args, config);
    debug!(?settings, "resolved fetch settings");

    let mut records = load_records(args)?;
    if !args.vendors.is_empty() {
        let filter = VendorFilter::new(&args.vendors).context("Invalid --vendor keywords")?;
        let before = records.len();
        records = filter.apply(records);
        info!(
            kept = records.len(),
            dropped = before - records.len(),
            vendors = ?filter.keys(),
            "applied vendor filter"
        );
    }

    if records.is_empty() {
        println!("No firmware records to fetch.");
        return Ok(ProcessExit::Success);
    }

    let plan = plan_jobs(&records, &settings.save_root);
    if args.dry_run {
        print_plan(&plan);
        return Ok(ProcessExit::Success);
    }

    let http = HttpClient::with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs)
        .context("Failed to build HTTP client")?;
    let ftp = FtpClient::with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs);
    let transports = Transports::new(Arc::new(http), Arc::new(ftp));
    let engine = DownloadEngine::new(
        settings.concurrency,
        RetryPolicy::with_max_retries(settings.max_retries),
    )?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight fetches");
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });
    let control = RunControl::with_interrupt_flag(interrupted);

    let show_progress = terminal::should_show_progress(
        io::stderr().is_terminal(),
        quiet,
        terminal::is_dumb_terminal(),
    );
    let (progress_handle, progress_stop) =
        progress::spawn_progress_ui(show_progress, control.processed_counter(), plan.len());

    let result = engine
        .run(&records, &settings.save_root, &transports, &control)
        .await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }
    let report = result.context("Fetch run could not start")?;

    for outcome in &report.outcomes {
        log_outcome(outcome);
    }

    if let Some(path) = &args.report {
        write_report(&report, &settings.save_root, path)
            .await
            .with_context(|| format!("Failed to write report '{}'", path.display()))?;
        info!(path = %path.display(), "wrote run report");
    }

    print_summary(&report, &settings.save_root);
    Ok(exit_handler::determine_exit_outcome(
        report.succeeded(),
        report.failed(),
        report.interrupted,
    ))
}

fn load_records(args: &FetchArgs) -> Result<Vec<FirmwareRecord>> {
    if let Some(dir) = &args.input_dir {
        let load = read_records_from_dir(dir)
            .with_context(|| format!("Failed to read catalogs from '{}'", dir.display()))?;
        if !load.failures.is_empty() {
            warn!(
                skipped_files = load.failures.len(),
                "some catalog files could not be read"
            );
        }
        return Ok(load.records);
    }
    let Some(path) = &args.input else {
        anyhow::bail!("Either --input or --input-dir is required");
    };
    read_records(path).with_context(|| format!("Failed to read catalog '{}'", path.display()))
}

fn log_outcome(outcome: &FetchOutcome) {
    let destination = outcome
        .destination
        .as_deref()
        .map_or_else(|| "-".to_string(), |p| p.display().to_string());
    match &outcome.result {
        Ok(bytes) => info!(
            vendor = %outcome.record.vendor,
            product = %outcome.record.product,
            destination = %destination,
            bytes,
            attempts = outcome.attempts,
            "fetched"
        ),
        Err(error) => warn!(
            vendor = %outcome.record.vendor,
            product = %outcome.record.product,
            destination = %destination,
            url = %outcome.record.url,
            kind = error.kind(),
            %error,
            "fetch failed"
        ),
    }
}

fn print_plan(plan: &JobPlan) {
    let mut lines: Vec<(usize, String)> = plan
        .jobs
        .iter()
        .map(|job| {
            (
                job.index,
                format!(
                    "{}\t{}\t{}",
                    job.transport,
                    job.url(),
                    job.destination.display()
                ),
            )
        })
        .collect();
    lines.extend(plan.rejected.iter().map(|(index, outcome)| {
        let reason = outcome
            .error()
            .map_or_else(String::new, ToString::to_string);
        (*index, format!("skip\t{}\t{reason}", outcome.record.url))
    }));
    lines.sort_by_key(|(index, _)| *index);

    for (_, line) in &lines {
        println!("{line}");
    }
    println!(
        "Dry run: {} to fetch, {} skipped, {} duplicate(s) dropped.",
        plan.jobs.len(),
        plan.rejected.len(),
        plan.duplicates
    );
}

fn print_summary(report: &RunReport, save_root: &Path) {
    println!(
        "Fetched {} of {} firmware image(s) into {} ({} bytes).",
        report.succeeded(),
        report.total(),
        save_root.display(),
        report.bytes_written()
    );
    if report.failed() > 0 {
        println!("{} fetch(es) failed.", report.failed());
    }
    if report.duplicates > 0 {
        println!("{} duplicate record(s) skipped.", report.duplicates);
    }
    if report.interrupted {
        println!("Run interrupted; remaining fetches were cancelled.");
    }
}

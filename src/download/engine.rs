//! Retrieval orchestrator.
//!
//! [`DownloadEngine::run`] turns firmware records into fetch jobs, creates
//! the target directories, and drives each job through its transport with
//! bounded concurrency. One job failing never aborts the batch: every record
//! ends up as a [`FetchOutcome`] in the returned [`RunReport`], in input
//! order.
//!
//! # Concurrency Model
//!
//! - Each job runs in its own Tokio task
//! - A semaphore permit is acquired before a task is spawned and held until
//!   the task finishes (RAII)
//! - Directories are created serially before any task starts
//! - A panicking task is reported as [`FetchError::TaskFailed`] for its job

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::layout::{filename_from_url, record_dir};
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::transport::{Fetcher, Transport, Transports};
use super::FetchError;
use crate::catalog::FirmwareRecord;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Batch-level failures. These stop a run before any job starts.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The save root could not be created.
    #[error("cannot create save root {path}: {source}")]
    SaveRoot {
        /// The requested save root.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// One planned fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    /// Position of this job's outcome in the run report.
    pub index: usize,
    /// The record the job came from.
    pub record: FirmwareRecord,
    /// Where the file goes.
    pub destination: PathBuf,
    /// Transport picked from the URL scheme.
    pub transport: Transport,
}

impl FetchJob {
    /// Source URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.record.url
    }
}

/// Result of one record.
#[derive(Debug)]
pub struct FetchOutcome {
    /// The record this outcome belongs to.
    pub record: FirmwareRecord,
    /// Planned destination; `None` when the URL had no filename.
    pub destination: Option<PathBuf>,
    /// Transport used; `None` when no fetch was attempted.
    pub transport: Option<Transport>,
    /// Fetch attempts made (0 when the job never ran).
    pub attempts: u32,
    /// Bytes written, or why the job failed.
    pub result: Result<u64, FetchError>,
}

impl FetchOutcome {
    fn rejected(record: FirmwareRecord, destination: Option<PathBuf>, error: FetchError) -> Self {
        Self {
            record,
            destination,
            transport: None,
            attempts: 0,
            result: Err(error),
        }
    }

    fn skipped(job: FetchJob, error: FetchError) -> Self {
        Self {
            record: job.record,
            destination: Some(job.destination),
            transport: Some(job.transport),
            attempts: 0,
            result: Err(error),
        }
    }

    /// Whether the file was fetched.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        self.result.as_ref().err()
    }
}

/// Planned work for a set of records.
#[derive(Debug, Default)]
pub struct JobPlan {
    /// Jobs that will be fetched, in input order.
    pub jobs: Vec<FetchJob>,
    /// Records rejected during planning, keyed by report position.
    pub rejected: Vec<(usize, FetchOutcome)>,
    /// Exact duplicates that were dropped.
    pub duplicates: usize,
}

impl JobPlan {
    /// Number of outcomes a run of this plan reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len() + self.rejected.len()
    }

    /// Whether the plan has nothing to report.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Derives fetch jobs from records.
///
/// - a URL without a filename yields a [`FetchError::NoFilename`] outcome
/// - an exact repeat (same URL, same destination) is dropped and counted
/// - a different URL claiming an already planned destination yields
///   [`FetchError::DestinationConflict`]
#[must_use]
pub fn plan_jobs(records: &[FirmwareRecord], save_root: &Path) -> JobPlan {
    let mut plan = JobPlan::default();
    let mut claimed: HashMap<PathBuf, String> = HashMap::new();
    let mut index = 0;

    for record in records {
        let Some(filename) = filename_from_url(&record.url) else {
            debug!(url = %record.url, "no filename in URL");
            plan.rejected.push((
                index,
                FetchOutcome::rejected(record.clone(), None, FetchError::no_filename(&record.url)),
            ));
            index += 1;
            continue;
        };
        let destination = record_dir(save_root, record).join(filename);

        if let Some(owner) = claimed.get(&destination) {
            if *owner == record.url {
                debug!(url = %record.url, "dropping duplicate job");
                plan.duplicates += 1;
                continue;
            }
            let error = FetchError::destination_conflict(&destination, &record.url, owner);
            plan.rejected.push((
                index,
                FetchOutcome::rejected(record.clone(), Some(destination), error),
            ));
            index += 1;
            continue;
        }

        claimed.insert(destination.clone(), record.url.clone());
        plan.jobs.push(FetchJob {
            index,
            record: record.clone(),
            destination,
            transport: Transport::for_url(&record.url),
        });
        index += 1;
    }

    plan
}

/// Shared run state: interrupt flag and processed-job counter.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    interrupted: Arc<AtomicBool>,
    processed: Arc<AtomicUsize>,
}

impl RunControl {
    /// Fresh control with the flag cleared and the counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing interrupt flag (for example one set by a Ctrl-C handler).
    #[must_use]
    pub fn with_interrupt_flag(interrupted: Arc<AtomicBool>) -> Self {
        Self {
            interrupted,
            processed: Arc::default(),
        }
    }

    /// Asks the run to stop.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    /// Whether an interrupt was requested.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Jobs finished so far (any result).
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    /// Shared handle to the processed counter.
    #[must_use]
    pub fn processed_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.processed)
    }

    fn flag(&self) -> &AtomicBool {
        &self.interrupted
    }

    fn mark_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Outcomes of one run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// One outcome per non-duplicate record, in input order.
    pub outcomes: Vec<FetchOutcome>,
    /// Exact duplicate jobs dropped during planning.
    pub duplicates: usize,
    /// Whether the run was interrupted.
    pub interrupted: bool,
}

impl RunReport {
    /// Number of outcomes.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of fetched files.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failed or skipped records.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Total bytes written.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .sum()
    }
}

/// Concurrent fetcher for firmware records.
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_policy: RetryPolicy,
}

impl DownloadEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `concurrency` is outside
    /// 1..=100.
    #[instrument(level = "debug", skip(retry_policy))]
    pub fn new(concurrency: usize, retry_policy: RetryPolicy) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            "creating download engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Fetches every record into `save_root/<vendor>/<product>/<filename>`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SaveRoot`] if `save_root` cannot be created or
    /// written to, and [`EngineError::SemaphoreClosed`] if the semaphore is
    /// closed. Per-job failures are reported in the [`RunReport`], never as an
    /// error.
    #[instrument(skip(self, records, transports, control), fields(records = records.len(), save_root = %save_root.display()))]
    pub async fn run(
        &self,
        records: &[FirmwareRecord],
        save_root: &Path,
        transports: &Transports,
        control: &RunControl,
    ) -> Result<RunReport, EngineError> {
        ensure_writable_root(save_root)
            .await
            .map_err(|source| EngineError::SaveRoot {
                path: save_root.to_path_buf(),
                source,
            })?;

        let plan = plan_jobs(records, save_root);
        info!(
            jobs = plan.jobs.len(),
            rejected = plan.rejected.len(),
            duplicates = plan.duplicates,
            "starting run"
        );

        let mut slots: Vec<Option<FetchOutcome>> = std::iter::repeat_with(|| None)
            .take(plan.len())
            .collect();
        for (index, outcome) in plan.rejected {
            slots[index] = Some(outcome);
            control.mark_processed();
        }

        let directory_errors = create_directories(&plan.jobs).await;

        let mut handles = Vec::new();
        for job in plan.jobs {
            if let Some(error) = job
                .destination
                .parent()
                .and_then(|dir| directory_errors.get(dir))
            {
                let error = FetchError::filesystem(
                    job.destination.parent().unwrap_or(save_root),
                    std::io::Error::new(error.kind(), error.to_string()),
                );
                let index = job.index;
                slots[index] = Some(FetchOutcome::skipped(job, error));
                control.mark_processed();
                continue;
            }

            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            if control.is_interrupted() {
                let error = FetchError::cancelled(job.url());
                let index = job.index;
                slots[index] = Some(FetchOutcome::skipped(job, error));
                control.mark_processed();
                continue;
            }

            let fetcher = Arc::clone(transports.fetcher(job.transport));
            let policy = self.retry_policy.clone();
            let task_control = control.clone();
            let index = job.index;
            let fallback = job.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let (attempts, result) =
                    fetch_with_retry(fetcher.as_ref(), &job, &policy, task_control.flag()).await;
                task_control.mark_processed();
                FetchOutcome {
                    record: job.record,
                    destination: Some(job.destination),
                    transport: Some(job.transport),
                    attempts,
                    result,
                }
            });
            handles.push((index, fallback, handle));
        }

        debug!(task_count = handles.len(), "waiting for fetches to complete");

        for (index, job, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(url = %job.url(), error = %e, "fetch task failed");
                    control.mark_processed();
                    let error = FetchError::task_failed(job.url(), &e);
                    FetchOutcome {
                        attempts: 1,
                        ..FetchOutcome::skipped(job, error)
                    }
                }
            };
            slots[index] = Some(outcome);
        }

        let report = RunReport {
            outcomes: slots.into_iter().flatten().collect(),
            duplicates: plan.duplicates,
            interrupted: control.is_interrupted(),
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            duplicates = report.duplicates,
            interrupted = report.interrupted,
            "run complete"
        );
        Ok(report)
    }
}

/// Creates each distinct job directory once, returning the ones that failed.
/// Marker file written and removed to prove the save root accepts files.
const WRITE_CHECK_FILE: &str = ".fwfetch-write-check";

/// Creates `save_root` if needed and checks that files can be created in it.
async fn ensure_writable_root(save_root: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(save_root).await?;
    let marker = save_root.join(WRITE_CHECK_FILE);
    tokio::fs::File::create(&marker).await?;
    tokio::fs::remove_file(&marker).await
}

async fn create_directories(jobs: &[FetchJob]) -> BTreeMap<PathBuf, std::io::Error> {
    let mut failures = BTreeMap::new();
    let mut seen: Vec<&Path> = Vec::new();

    for dir in jobs.iter().filter_map(|job| job.destination.parent()) {
        if seen.contains(&dir) {
            continue;
        }
        seen.push(dir);
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %e, "cannot create directory");
            failures.insert(dir.to_path_buf(), e);
        }
    }

    failures
}

/// Runs one job, retrying transient failures per `policy`.
///
/// Returns the number of attempts made alongside the final result.
#[instrument(skip(fetcher, job, policy, interrupted), fields(url = %job.url(), transport = %job.transport))]
async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    job: &FetchJob,
    policy: &RetryPolicy,
    interrupted: &AtomicBool,
) -> (u32, Result<u64, FetchError>) {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(attempt, "attempting fetch");

        let error = match fetcher.fetch(job.url(), &job.destination, interrupted).await {
            Ok(bytes) => return (attempt, Ok(bytes)),
            Err(e) => e,
        };
        if interrupted.load(Ordering::SeqCst) {
            return (attempt, Err(error));
        }

        match policy.should_retry(classify_error(&error), attempt) {
            RetryDecision::Retry {
                delay,
                attempt: next_attempt,
            } => {
                info!(
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "retrying fetch"
                );
                tokio::time::sleep(delay).await;
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(%reason, "not retrying fetch");
                return (attempt, Err(error));
            }
        }
    }
}

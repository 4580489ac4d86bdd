//! Bounded retries with exponential backoff for transient fetch failures.
//!
//! A failed job is classified into a [`FailureType`]. Only transient failures
//! are retried, and only while the [`RetryPolicy`] has attempts left. The
//! default policy makes a single attempt.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::{FetchError, FtpStage};

/// Upper bound accepted for `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed later: dropped connection, overloaded server.
    Transient,
    /// Will fail the same way again.
    Permanent,
}

/// Decision on whether to retry a failed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`; `attempt` is the upcoming attempt number.
    Retry { delay: Duration, attempt: u32 },
    /// Give up.
    DoNotRetry { reason: String },
}

/// Retry configuration.
///
/// `delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Policy allowing `max_retries` extra attempts after the first one.
    ///
    /// Values above [`MAX_RETRIES_LIMIT`] are clamped.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries.min(MAX_RETRIES_LIMIT) + 1,
            ..Self::default()
        }
    }

    /// Overrides the backoff timing. Mostly useful for tests.
    #[must_use]
    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Total attempts allowed, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what to do after attempt number `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure".to_string(),
            };
        }
        if attempt >= self.max_attempts {
            debug!(attempt, "attempts exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.delay_for(attempt);
        debug!(attempt, delay_ms = delay.as_millis(), "will retry");
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let raw_ms = base_ms * self.backoff_multiplier.powf(exponent);
        let capped_ms = raw_ms.min(self.max_delay.as_millis() as f64);

        let jitter_cap = MAX_JITTER.min(self.base_delay).as_millis() as u64;
        let jitter_ms = rand::thread_rng().gen_range(0..=jitter_cap);
        Duration::from_millis(capped_ms as u64) + Duration::from_millis(jitter_ms)
    }
}

/// Classifies a fetch error for retry purposes.
///
/// Transient: network errors other than TLS, HTTP 408/429/5xx, FTP connect
/// failures. Everything else is permanent, including cancellation.
#[must_use]
pub fn classify_error(error: &FetchError) -> FailureType {
    match error {
        FetchError::Network { source, .. } if !is_tls_error(source) => FailureType::Transient,
        FetchError::HttpStatus { status, .. } => classify_http_status(*status),
        FetchError::Ftp {
            stage: FtpStage::Connect,
            ..
        } => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 | 429 | 500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let text = error.to_string().to_lowercase();
    ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|needle| text.contains(needle))
}

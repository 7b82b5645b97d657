//! Retry policy and backoff for the request pipeline.

use crate::constants::{DEFAULT_MAX_RETRIES, DEFAULT_MAX_RETRY_WAIT, DEFAULT_MIN_RETRY_WAIT};
use http::StatusCode;
use std::fmt::Debug;
use std::time::Duration;

/// Retry/backoff configuration.
///
/// A request is attempted at most `max_retries + 1` times. Waits between
/// attempts grow exponentially from `min_backoff` up to `max_backoff`, with
/// small jitter.
///
/// If `min_backoff > max_backoff`, they are swapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt. Zero disables retries.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub min_backoff: Duration,
    /// Upper bound of any single wait.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            min_backoff: DEFAULT_MIN_RETRY_WAIT,
            max_backoff: DEFAULT_MAX_RETRY_WAIT,
        }
    }
}

impl RetryConfig {
    pub(crate) fn normalize(mut self) -> Self {
        if self.min_backoff > self.max_backoff {
            std::mem::swap(&mut self.min_backoff, &mut self.max_backoff);
        }
        self
    }
}

/// Outcome of a single attempt, as seen by a [`RetryPolicy`].
#[derive(Debug)]
pub enum AttemptOutcome<'a> {
    /// The server answered with this status.
    Status(StatusCode),
    /// No response was received.
    Transport(&'a reqwest::Error),
}

/// Decides whether a failed attempt should be retried.
///
/// The pipeline only consults the policy for requests that are safe to replay:
/// idempotent methods (or requests explicitly marked idempotent) with a
/// buffered body.
///
/// # Example
///
/// ```
/// use vault_api::{AttemptOutcome, RetryPolicy};
///
/// #[derive(Debug)]
/// struct OnlyUnavailable;
///
/// impl RetryPolicy for OnlyUnavailable {
///     fn should_retry(&self, outcome: &AttemptOutcome<'_>) -> bool {
///         matches!(outcome, AttemptOutcome::Status(s) if s.as_u16() == 503)
///     }
/// }
/// ```
pub trait RetryPolicy: Debug + Send + Sync + 'static {
    /// Returns `true` if the request should be attempted again.
    fn should_retry(&self, outcome: &AttemptOutcome<'_>) -> bool;
}

/// Retries transport failures and server errors.
///
/// - transport errors are retried unless the request itself could not be built
///   or a redirect loop was detected by the transport,
/// - status codes of 500 and above are retried, except 501 (the server will
///   never implement the operation),
/// - everything else, including all 4xx codes, is final.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, outcome: &AttemptOutcome<'_>) -> bool {
        match outcome {
            AttemptOutcome::Transport(err) => !(err.is_builder() || err.is_redirect()),
            AttemptOutcome::Status(status) => {
                status.is_server_error() && *status != StatusCode::NOT_IMPLEMENTED
            }
        }
    }
}

/// Exponential backoff with small jitter.
///
/// Doubles `current`, clamps to `max`, then adds up to 10% jitter (still
/// clamped).
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn next_backoff(current: Duration, max: Duration) -> Duration {
    let cur = current.as_millis().min(u128::from(u64::MAX)) as u64;
    let max = max.as_millis().min(u128::from(u64::MAX)) as u64;

    let base = cur.saturating_mul(2).min(max);
    if base == 0 {
        return Duration::ZERO;
    }

    let jitter = base / 10;
    let add = if jitter > 0 {
        fastrand::u64(0..=jitter)
    } else {
        0
    };
    Duration::from_millis(base.saturating_add(add).min(max))
}

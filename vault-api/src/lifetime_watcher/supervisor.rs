use super::builder::RenewBehavior;
use super::errors::LifetimeWatcherError;
use super::timing::{grace_window, sleep_before_renewal, within_grace};
use super::types::{RandomSource, RenewTarget};
use super::watcher::{Inner, RenewOutput};
use crate::error::ClientError;
use crate::prelude::{debug, info, warn};
use crate::secret::Secret;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::{sleep, Instant};

/// Consecutive identical failures logged at WARN before dropping to DEBUG.
const MAX_CONSECUTIVE_SAME_ERROR: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorKey {
    RenewFailed,
    NoSecretData,
}

/// Counts consecutive failures of the same kind to keep repeated renewal
/// failures from flooding the log.
struct ErrorTracker {
    last_error_kind: Option<ErrorKey>,
    consecutive_same_error: u32,
    max_consecutive: u32,
}

impl ErrorTracker {
    fn new(max_consecutive: u32) -> Self {
        Self {
            last_error_kind: None,
            consecutive_same_error: 0,
            max_consecutive,
        }
    }

    /// Records a failure; returns whether it should be logged at WARN.
    fn record_error(&mut self, error_kind: ErrorKey) -> bool {
        let should_warn = self.last_error_kind != Some(error_kind)
            || self.consecutive_same_error < self.max_consecutive;

        if self.last_error_kind == Some(error_kind) {
            self.consecutive_same_error += 1;
        } else {
            self.consecutive_same_error = 1;
            self.last_error_kind = Some(error_kind);
        }

        should_warn
    }

    fn reset(&mut self) {
        self.consecutive_same_error = 0;
        self.last_error_kind = None;
    }

    fn consecutive_count(&self) -> u32 {
        self.consecutive_same_error
    }
}

/// What is being kept alive, as read from the watched secret.
struct Subject {
    target: RenewTarget,
    token_mode: bool,
    renewable: bool,
    ttl: Duration,
}

impl Subject {
    fn from_secret(secret: &Secret, increment: u64) -> (Self, bool) {
        match &secret.auth {
            Some(auth) => (
                Self {
                    target: RenewTarget::Token {
                        token: auth.client_token.clone(),
                        increment,
                    },
                    token_mode: true,
                    renewable: auth.renewable,
                    ttl: Duration::from_secs(auth.lease_duration),
                },
                auth.client_token.is_empty(),
            ),
            None => (
                Self {
                    target: RenewTarget::Lease {
                        lease_id: secret.lease_id.clone(),
                        increment,
                    },
                    token_mode: false,
                    renewable: secret.renewable,
                    ttl: Duration::from_secs(secret.lease_duration),
                },
                secret.lease_id.is_empty(),
            ),
        }
    }
}

/// Renewable flag and granted TTL of a renewal response.
fn granted(renewal: &Secret, token_mode: bool) -> Option<(bool, Duration)> {
    if token_mode {
        let auth = renewal.auth.as_ref()?;
        Some((auth.renewable, Duration::from_secs(auth.lease_duration)))
    } else {
        Some((renewal.renewable, Duration::from_secs(renewal.lease_duration)))
    }
}

/// Runs the renewal loop until stop, a terminal error, or the grace window.
pub(super) async fn run_watcher(
    inner: &Inner,
    random: &mut RandomSource,
) -> Result<(), LifetimeWatcherError> {
    if inner.cancel.is_cancelled() {
        return Ok(());
    }

    let (subject, missing_credential) = Subject::from_secret(&inner.secret, inner.increment);
    if missing_credential
        || (!subject.renewable && inner.behavior == RenewBehavior::ErrorOnErrors)
    {
        debug!(
            "Lifetime watcher cannot renew: token_mode={}, renewable={}",
            subject.token_mode, subject.renewable
        );
        return Err(LifetimeWatcherError::NotRenewable);
    }

    info!(
        "Lifetime watcher started: token_mode={}, ttl_s={}, increment_s={}, behavior={:?}",
        subject.token_mode,
        subject.ttl.as_secs(),
        inner.increment,
        inner.behavior
    );

    let mut tracker = ErrorTracker::new(MAX_CONSECUTIVE_SAME_ERROR);
    let mut renewed_at = Instant::now();
    let mut prior = subject.ttl;
    let mut grace = grace_window(prior, random());

    loop {
        if inner.cancel.is_cancelled() {
            return Ok(());
        }

        let fallback = remaining(renewed_at, prior);
        let ttl = if !subject.renewable || inner.behavior == RenewBehavior::RenewDisabled {
            fallback
        } else {
            let attempt = tokio::select! {
                biased;
                () = inner.cancel.cancelled() => return Ok(()),
                res = (inner.renewer)(subject.target.clone()) => res,
            };

            match check_renewal(attempt, subject.token_mode) {
                Ok((renewal, still_renewable, granted_ttl)) => {
                    if tracker.consecutive_count() > 0 {
                        info!(
                            "Renewal recovered after {} consecutive failures",
                            tracker.consecutive_count()
                        );
                    }
                    tracker.reset();
                    debug!(
                        "Renewed: ttl_s={}, renewable={still_renewable}",
                        granted_ttl.as_secs()
                    );

                    // Best effort: a slow consumer misses events.
                    let _ = inner.renew_tx.try_send(RenewOutput {
                        renewed_at: OffsetDateTime::now_utc(),
                        secret: renewal,
                    });

                    if !still_renewable && inner.behavior == RenewBehavior::ErrorOnErrors {
                        return Err(LifetimeWatcherError::NotRenewable);
                    }
                    renewed_at = Instant::now();
                    granted_ttl
                }
                Err(err) => {
                    if inner.behavior == RenewBehavior::ErrorOnErrors {
                        warn!("Renewal failed; stopping watcher: error={err}");
                        return Err(err);
                    }
                    let key = match err {
                        LifetimeWatcherError::NoSecretData => ErrorKey::NoSecretData,
                        _ => ErrorKey::RenewFailed,
                    };
                    if tracker.record_error(key) {
                        warn!(
                            "Renewal failed; continuing with remaining TTL: error={err}, remaining_s={}",
                            fallback.as_secs()
                        );
                    } else {
                        debug!(
                            "Renewal failed (repeated); continuing with remaining TTL: error={err}, remaining_s={}, consecutive_failures={}",
                            fallback.as_secs(),
                            tracker.consecutive_count()
                        );
                    }
                    fallback
                }
            }
        };

        // The grace window follows the TTL only while renewals extend it.
        if ttl > prior {
            grace = grace_window(ttl, random());
        }
        prior = ttl;

        let pause = sleep_before_renewal(ttl, grace, random());
        if within_grace(ttl, grace, pause) {
            info!(
                "Lifetime watcher done: remaining_s={}, grace_s={}",
                ttl.as_secs(),
                grace.as_secs()
            );
            return Ok(());
        }

        tokio::select! {
            () = inner.cancel.cancelled() => return Ok(()),
            () = sleep(pause) => {}
        }
    }
}

/// TTL left of `ttl` granted at `granted_at`. A TTL past the clock's range
/// never counts down.
fn remaining(granted_at: Instant, ttl: Duration) -> Duration {
    granted_at
        .checked_add(ttl)
        .map_or(ttl, |expiry| expiry.saturating_duration_since(Instant::now()))
}

fn check_renewal(
    attempt: Result<Option<Secret>, ClientError>,
    token_mode: bool,
) -> Result<(Secret, bool, Duration), LifetimeWatcherError> {
    let renewal = attempt?.ok_or(LifetimeWatcherError::NoSecretData)?;
    let (renewable, ttl) =
        granted(&renewal, token_mode).ok_or(LifetimeWatcherError::NoSecretData)?;
    Ok((renewal, renewable, ttl))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::SecretAuth;

    #[test]
    fn test_error_tracker_downgrades_after_repeats() {
        let mut tracker = ErrorTracker::new(MAX_CONSECUTIVE_SAME_ERROR);
        assert!(tracker.record_error(ErrorKey::RenewFailed));
        assert!(tracker.record_error(ErrorKey::RenewFailed));
        assert!(tracker.record_error(ErrorKey::RenewFailed));
        assert!(!tracker.record_error(ErrorKey::RenewFailed));
        assert_eq!(tracker.consecutive_count(), 4);

        assert!(tracker.record_error(ErrorKey::NoSecretData));
        assert_eq!(tracker.consecutive_count(), 1);

        tracker.reset();
        assert_eq!(tracker.consecutive_count(), 0);
    }

    #[test]
    fn test_subject_prefers_auth() {
        let secret = Secret {
            lease_id: "lease".into(),
            lease_duration: 60,
            auth: Some(SecretAuth {
                client_token: "tkn".into(),
                renewable: true,
                lease_duration: 3600,
                ..SecretAuth::default()
            }),
            ..Secret::default()
        };
        let (subject, missing) = Subject::from_secret(&secret, 30);
        assert!(!missing);
        assert!(subject.token_mode);
        assert!(subject.renewable);
        assert_eq!(subject.ttl, Duration::from_secs(3600));
        assert_eq!(
            subject.target,
            RenewTarget::Token {
                token: "tkn".into(),
                increment: 30
            }
        );
    }

    #[test]
    fn test_subject_without_lease_id_is_missing_credential() {
        let (subject, missing) = Subject::from_secret(&Secret::default(), 0);
        assert!(missing);
        assert!(!subject.token_mode);
    }

    #[test]
    fn test_remaining_with_unrepresentable_expiry() {
        let now = Instant::now();
        let ttl = Duration::from_secs(u64::MAX);
        assert_eq!(remaining(now, ttl), ttl);
        assert!(remaining(now, Duration::from_secs(60)) <= Duration::from_secs(60));
    }

    #[test]
    fn test_token_renewal_without_auth_is_no_secret_data() {
        let err = check_renewal(Ok(Some(Secret::default())), true).unwrap_err();
        assert!(matches!(err, LifetimeWatcherError::NoSecretData));

        let err = check_renewal(Ok(None), false).unwrap_err();
        assert!(matches!(err, LifetimeWatcherError::NoSecretData));
    }
}

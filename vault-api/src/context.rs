//! Cancellation and deadlines for client calls.

use crate::error::ClientError;
use std::future::{pending, Future};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Cancellation scope of a client call.
///
/// A `Context` combines an optional [`CancellationToken`] with an optional
/// deadline. The default ([`Context::background`]) never cancels. Cancelling
/// the token aborts in-flight requests and retry waits; an elapsed deadline
/// does the same with [`ClientError::DeadlineExceeded`].
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use vault_api::{Client, Context};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new()?;
/// let ctx = Context::with_timeout(Duration::from_secs(5));
/// let status = client.sys().with_context(ctx).seal_status().await?;
/// println!("sealed: {}", status.sealed);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct Context {
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled together with `token`.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            deadline: None,
        }
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: None,
            deadline: Some(deadline),
        }
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Shortens the deadline to at most `timeout` from now.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(candidate),
            None => candidate,
        });
        self
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the cancellation token, if any.
    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Returns an error if the context is already cancelled or expired.
    ///
    /// # Errors
    ///
    /// [`ClientError::Cancelled`] or [`ClientError::DeadlineExceeded`].
    pub fn check(&self) -> Result<(), ClientError> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(ClientError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ClientError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drives `fut` until it completes or the context ends, whichever is first.
    pub(crate) async fn run<T, F>(&self, fut: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        self.check()?;

        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Err(ClientError::Cancelled),
            () = expired => Err(ClientError::DeadlineExceeded),
            res = fut => res,
        }
    }

    /// Sleeps for `dur` unless the context ends first.
    pub(crate) async fn sleep(&self, dur: Duration) -> Result<(), ClientError> {
        self.run(async {
            tokio::time::sleep(dur).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_never_cancels() {
        let ctx = Context::background();
        assert!(ctx.check().is_ok());
        let out = ctx.run(async { Ok::<_, ClientError>(7) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_run() {
        let token = CancellationToken::new();
        let ctx = Context::with_cancellation(token.clone());
        token.cancel();
        let err = ctx.run(pending::<Result<(), ClientError>>()).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_sleep() {
        let ctx = Context::with_timeout(Duration::from_secs(1));
        let err = ctx.sleep(Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(err, ClientError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_only_shortens_deadline() {
        let ctx = Context::with_timeout(Duration::from_secs(5)).timeout(Duration::from_secs(60));
        let deadline = ctx.deadline().unwrap();
        assert!(deadline <= Instant::now() + Duration::from_secs(5));
    }
}

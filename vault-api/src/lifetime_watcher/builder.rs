use super::errors::LifetimeWatcherError;
use super::types::{RandomSource, RenewFuture, RenewTarget, Renewer};
use super::watcher::LifetimeWatcher;
use crate::client::Client;
use crate::secret::Secret;
use std::fmt::Debug;
use std::sync::Arc;

/// Capacity of the renewal event channel unless configured otherwise.
pub(super) const DEFAULT_RENEW_BUFFER: usize = 5;

/// How a [`LifetimeWatcher`] reacts to renewal failures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenewBehavior {
    /// Keep going on errors, counting down the last known TTL until it
    /// reaches the grace window.
    #[default]
    IgnoreErrors,
    /// Never renew; only count down the initial TTL.
    RenewDisabled,
    /// Exit on the first error or on a secret that cannot be renewed.
    ErrorOnErrors,
}

/// Builder for [`LifetimeWatcher`].
///
/// # Example
///
/// ```no_run
/// use vault_api::{Client, LifetimeWatcher, RenewBehavior};
///
/// # fn example(client: Client, secret: vault_api::Secret) -> Result<(), Box<dyn std::error::Error>> {
/// let watcher = LifetimeWatcher::builder(client)
///     .secret(secret)
///     .increment(3600)
///     .renew_buffer(16)
///     .behavior(RenewBehavior::IgnoreErrors)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct LifetimeWatcherBuilder {
    client: Client,
    secret: Option<Secret>,
    increment: u64,
    renew_buffer: usize,
    behavior: RenewBehavior,
    random: Option<RandomSource>,
    renewer: Option<Renewer>,
}

impl Debug for LifetimeWatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifetimeWatcherBuilder")
            .field("has_secret", &self.secret.is_some())
            .field("increment", &self.increment)
            .field("renew_buffer", &self.renew_buffer)
            .field("behavior", &self.behavior)
            .field("custom_random", &self.random.is_some())
            .field("custom_renewer", &self.renewer.is_some())
            .finish()
    }
}

impl LifetimeWatcherBuilder {
    pub(super) fn new(client: Client) -> Self {
        Self {
            client,
            secret: None,
            increment: 0,
            renew_buffer: DEFAULT_RENEW_BUFFER,
            behavior: RenewBehavior::default(),
            random: None,
            renewer: None,
        }
    }

    /// The secret to keep alive. Required.
    #[must_use]
    pub fn secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Extension requested on every renewal, in seconds. Zero (the default)
    /// lets the server choose.
    #[must_use]
    pub fn increment(mut self, seconds: u64) -> Self {
        self.increment = seconds;
        self
    }

    /// Capacity of the renewal event channel. Zero is treated as one.
    #[must_use]
    pub fn renew_buffer(mut self, capacity: usize) -> Self {
        self.renew_buffer = capacity;
        self
    }

    /// Reaction to renewal failures.
    #[must_use]
    pub fn behavior(mut self, behavior: RenewBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Randomness used for the grace window and sleep jitter.
    ///
    /// Must yield values in `[0, 1)`; anything else is clamped.
    #[must_use]
    pub fn random_source<F>(mut self, random: F) -> Self
    where
        F: FnMut() -> f64 + Send + 'static,
    {
        self.random = Some(Box::new(random));
        self
    }

    /// Replaces the function that performs a renewal.
    ///
    /// By default tokens are renewed through `auth/token/renew-self`
    /// (authenticated as the watched token) and leases through
    /// `sys/leases/renew`, using the builder's client.
    #[must_use]
    pub fn renewer<F>(mut self, renewer: F) -> Self
    where
        F: Fn(RenewTarget) -> RenewFuture + Send + Sync + 'static,
    {
        self.renewer = Some(Arc::new(renewer));
        self
    }

    /// Builds the watcher. It does nothing until [`LifetimeWatcher::start`].
    ///
    /// # Errors
    ///
    /// [`LifetimeWatcherError::MissingSecret`] if no secret was given.
    pub fn build(self) -> Result<LifetimeWatcher, LifetimeWatcherError> {
        let secret = self.secret.ok_or(LifetimeWatcherError::MissingSecret)?;
        let renewer = self
            .renewer
            .unwrap_or_else(|| default_renewer(self.client));
        let random = self.random.unwrap_or_else(|| Box::new(fastrand::f64));

        Ok(LifetimeWatcher::new(
            secret,
            self.increment,
            self.renew_buffer.max(1),
            self.behavior,
            random,
            renewer,
        ))
    }
}

fn default_renewer(client: Client) -> Renewer {
    Arc::new(move |target| {
        let client = client.clone();
        Box::pin(async move {
            match target {
                RenewTarget::Token { token, increment } => {
                    client
                        .auth()
                        .token()
                        .renew_token_as_self(&token, increment)
                        .await
                }
                RenewTarget::Lease { lease_id, increment } => {
                    client.sys().renew(&lease_id, increment).await
                }
            }
        })
    })
}

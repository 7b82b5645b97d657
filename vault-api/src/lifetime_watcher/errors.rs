use crate::error::ClientError;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a [`LifetimeWatcher`](super::LifetimeWatcher).
///
/// Cloneable so that every [`LifetimeWatcherDone`](super::LifetimeWatcherDone)
/// handle observes the same terminal error.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum LifetimeWatcherError {
    /// The builder was not given a secret to watch.
    #[error("a secret is required to build a lifetime watcher")]
    MissingSecret,

    /// The secret carries no token or lease id, or cannot be renewed.
    #[error("secret is not renewable")]
    NotRenewable,

    /// A renewal succeeded but its response had no usable secret.
    #[error("no secret data in renewal response")]
    NoSecretData,

    /// A renewal failed.
    #[error("renewal failed: {0}")]
    Renew(#[source] Arc<ClientError>),

    /// The watcher task panicked or ended without reporting a result.
    #[error("lifetime watcher task ended unexpectedly")]
    Closed,
}

impl From<ClientError> for LifetimeWatcherError {
    fn from(err: ClientError) -> Self {
        Self::Renew(Arc::new(err))
    }
}

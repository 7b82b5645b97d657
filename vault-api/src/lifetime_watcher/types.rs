use crate::error::ClientError;
use crate::secret::Secret;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// What a renewal is for, as handed to the renew function.
#[derive(Clone, PartialEq, Eq)]
pub enum RenewTarget {
    /// Renew an auth token by `increment` seconds.
    Token {
        /// The token being kept alive.
        token: String,
        /// Requested extension; zero lets the server choose.
        increment: u64,
    },
    /// Renew a lease by `increment` seconds.
    Lease {
        /// The lease being kept alive.
        lease_id: String,
        /// Requested extension; zero lets the server choose.
        increment: u64,
    },
}

impl std::fmt::Debug for RenewTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenewTarget::Token { increment, .. } => f
                .debug_struct("Token")
                .field("token", &"<redacted>")
                .field("increment", increment)
                .finish(),
            RenewTarget::Lease { lease_id, increment } => f
                .debug_struct("Lease")
                .field("lease_id", lease_id)
                .field("increment", increment)
                .finish(),
        }
    }
}

/// Future returned by a renew function.
pub type RenewFuture = Pin<Box<dyn Future<Output = Result<Option<Secret>, ClientError>> + Send>>;

pub(super) type Renewer = Arc<dyn Fn(RenewTarget) -> RenewFuture + Send + Sync + 'static>;

/// Source of uniformly distributed values in `[0, 1)`.
pub(super) type RandomSource = Box<dyn FnMut() -> f64 + Send + 'static>;

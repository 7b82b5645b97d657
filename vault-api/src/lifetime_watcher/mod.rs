//! Lifetime watcher: keeps a lease or an auth token alive in the background.
//!
//! A [`LifetimeWatcher`] is built from a [`Secret`](crate::Secret) returned by a
//! login, a token creation or a leased read. Once started it renews the token
//! (through `auth/token/renew-self`, authenticated as that token) or the lease
//! (through `sys/leases/renew`), sleeping about two thirds of the granted TTL
//! between renewals. It stops on its own when the remaining TTL falls into a
//! randomized grace window, so the caller can re-authenticate or fetch a new
//! secret in time.
//!
//! Successful renewals are published on [`LifetimeWatcher::renewals`]; the
//! channel is bounded and drops events the consumer is too slow to take.
//! [`LifetimeWatcher::done`] resolves exactly once, when the watcher exits.
//!
//! # Example
//!
//! ```no_run
//! use vault_api::{Client, LifetimeWatcher, RenewBehavior};
//!
//! # async fn example(client: Client, secret: vault_api::Secret) -> Result<(), Box<dyn std::error::Error>> {
//! let watcher = LifetimeWatcher::builder(client)
//!     .secret(secret)
//!     .behavior(RenewBehavior::ErrorOnErrors)
//!     .build()?;
//! watcher.start();
//!
//! let mut renewals = watcher.renewals().ok_or("already taken")?;
//! let mut done = watcher.done();
//! loop {
//!     tokio::select! {
//!         result = done.wait() => {
//!             // Re-authenticate or re-read the secret here.
//!             result?;
//!             break;
//!         }
//!         Some(renewal) = renewals.recv() => {
//!             println!("renewed at {}", renewal.renewed_at);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod errors;
mod supervisor;
mod timing;
mod types;
mod watcher;

pub use builder::{LifetimeWatcherBuilder, RenewBehavior};
pub use errors::LifetimeWatcherError;
pub use types::{RenewFuture, RenewTarget};
pub use watcher::{LifetimeWatcher, LifetimeWatcherDone, LifetimeWatcherRenewals, RenewOutput};

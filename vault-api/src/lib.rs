#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

//! Async client for the Vault HTTP API.
//!
//! The entry point is [`Client`], which owns the HTTP transport and the session
//! state (token, namespace, custom headers). Requests go through one pipeline
//! that adds the client headers, retries idempotent calls with backoff, follows
//! a single redirect and turns error statuses into [`ClientError`]s.
//!
//! On top of the pipeline sit thin façades:
//! - [`Logical`] for untyped reads and writes of any `/v1/<mount>/...` path,
//! - [`KvV1`] and [`KvV2`] for the key/value engines,
//! - [`Sys`] for the system backend,
//! - [`Auth`] and [`TokenAuth`] for logins and the token engine.
//!
//! [`LifetimeWatcher`] keeps a lease or a token alive in the background.
//!
//! ```no_run
//! use vault_api::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Reads VAULT_ADDR, VAULT_TOKEN, VAULT_NAMESPACE, TLS settings, ...
//! let client = Client::new()?;
//!
//! let health = client.sys().health().await?;
//! println!("sealed={} version={}", health.sealed, health.version);
//!
//! // A 404 is `None`, not an error.
//! if let Some(secret) = client.logical().read("secret/data/app").await? {
//!     println!("{:?}", secret.data);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **`logging`** (default): diagnostics through the `log` crate.
//! - **`tracing`**: diagnostics through `tracing` instead.

pub mod auth;
pub mod client;
pub mod constants;
mod context;
mod duration;
pub mod error;
pub mod kv;
pub mod lifetime_watcher;
mod logical;
mod observability;
mod prelude;
mod secret;
mod sudo_paths;
pub mod sys;

// -----------------------
// Re-exports
// -----------------------

pub use crate::{
    auth::{Auth, AuthMethod, TokenAuth, TokenCreateRequest},
    client::{
        AttemptOutcome, Client, ClientBuilder, ClientIdentityProvider, DefaultRetryPolicy,
        DefaultWrappingLookup, ReplicationForwarding, Request, Response, RetryConfig, RetryPolicy,
        TlsConfig, WrappingLookup,
    },
    context::Context,
    error::{ClientError, ConfigError, ErrorKind, ResponseError},
    kv::{KvMetadata, KvPutOptions, KvSecret, KvV1, KvV2, KvVersionMetadata},
    lifetime_watcher::{LifetimeWatcher, LifetimeWatcherError, RenewBehavior, RenewOutput},
    logical::Logical,
    secret::{
        MfaConstraintAny, MfaMethodId, MfaRequirement, Secret, SecretAuth, SecretWrapInfo,
    },
    sudo_paths::{is_sudo_path, sudo_path_templates},
    sys::Sys,
};

pub use tokio_util::sync::CancellationToken;

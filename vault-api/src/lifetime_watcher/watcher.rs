use super::builder::{LifetimeWatcherBuilder, RenewBehavior};
use super::errors::LifetimeWatcherError;
use super::supervisor::run_watcher;
use super::types::{RandomSource, Renewer};
use crate::client::Client;
use crate::prelude::error;
use crate::secret::Secret;
use futures::FutureExt;
use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

type DoneState = Option<Result<(), LifetimeWatcherError>>;

/// One successful renewal.
#[derive(Clone, Debug, PartialEq)]
pub struct RenewOutput {
    /// When the renewal response was received (UTC).
    pub renewed_at: OffsetDateTime,
    /// The renewal response.
    pub secret: Secret,
}

/// Receiving end of the renewal events of a [`LifetimeWatcher`].
#[derive(Debug)]
pub struct LifetimeWatcherRenewals {
    rx: mpsc::Receiver<RenewOutput>,
}

impl LifetimeWatcherRenewals {
    /// Waits for the next renewal event.
    ///
    /// Returns `None` once the watcher is gone and every buffered event has
    /// been received.
    pub async fn recv(&mut self) -> Option<RenewOutput> {
        self.rx.recv().await
    }

    /// Returns a buffered renewal event without waiting.
    pub fn try_recv(&mut self) -> Option<RenewOutput> {
        self.rx.try_recv().ok()
    }
}

/// Completion signal of a [`LifetimeWatcher`]. Cloneable; every clone sees
/// the same result.
#[derive(Clone, Debug)]
pub struct LifetimeWatcherDone {
    rx: watch::Receiver<DoneState>,
}

impl LifetimeWatcherDone {
    /// Waits until the watcher exits and returns why.
    ///
    /// `Ok(())` means the watcher was stopped or the TTL reached the grace
    /// window; the caller should re-authenticate or fetch a new secret.
    ///
    /// # Errors
    ///
    /// The terminal error of the watcher, or
    /// [`LifetimeWatcherError::Closed`] if its task panicked or vanished
    /// without a result.
    pub async fn wait(&mut self) -> Result<(), LifetimeWatcherError> {
        let state = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| LifetimeWatcherError::Closed)?;
        state.clone().unwrap_or(Ok(()))
    }

    /// Returns the result if the watcher already exited.
    pub fn try_result(&self) -> Option<Result<(), LifetimeWatcherError>> {
        self.rx.borrow().clone()
    }
}

/// Background renewal of a lease or auth token.
///
/// Built with [`LifetimeWatcher::builder`]; see the
/// [module documentation](crate::lifetime_watcher) for the renewal schedule.
/// Dropping the watcher stops it.
pub struct LifetimeWatcher {
    inner: Arc<Inner>,
}

pub(super) struct Inner {
    pub(super) secret: Secret,
    pub(super) increment: u64,
    pub(super) behavior: RenewBehavior,
    pub(super) renewer: Renewer,
    pub(super) renew_tx: mpsc::Sender<RenewOutput>,
    pub(super) cancel: CancellationToken,

    random: Mutex<Option<RandomSource>>,
    renew_rx: Mutex<Option<mpsc::Receiver<RenewOutput>>>,
    done_tx: watch::Sender<DoneState>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl Debug for LifetimeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifetimeWatcher")
            .field("lease_id", &self.inner.secret.lease_id)
            .field("token_mode", &self.inner.secret.auth.is_some())
            .field("increment", &self.inner.increment)
            .field("behavior", &self.inner.behavior)
            .field("started", &self.inner.started.load(Ordering::Acquire))
            .field("stopped", &self.inner.stopped.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LifetimeWatcher {
    /// Starts configuring a watcher that renews through `client`.
    pub fn builder(client: Client) -> LifetimeWatcherBuilder {
        LifetimeWatcherBuilder::new(client)
    }

    pub(super) fn new(
        secret: Secret,
        increment: u64,
        renew_buffer: usize,
        behavior: RenewBehavior,
        random: RandomSource,
        renewer: Renewer,
    ) -> Self {
        let (renew_tx, renew_rx) = mpsc::channel(renew_buffer);
        let (done_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                secret,
                increment,
                behavior,
                renewer,
                renew_tx,
                cancel: CancellationToken::new(),
                random: Mutex::new(Some(random)),
                renew_rx: Mutex::new(Some(renew_rx)),
                done_tx,
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Spawns the renewal task on the current Tokio runtime.
    ///
    /// Only the first call has an effect.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(&self) {
        if self.inner.stopped.load(Ordering::Acquire)
            || self.inner.started.swap(true, Ordering::AcqRel)
        {
            return;
        }
        let Some(mut random) = lock(&self.inner.random).take() else {
            return;
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = AssertUnwindSafe(run_watcher(&inner, &mut random))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    error!("Lifetime watcher task panicked");
                    Err(LifetimeWatcherError::Closed)
                });
            inner.done_tx.send_replace(Some(result));
        });
    }

    /// Stops the watcher. No renewal starts after this returns; an in-flight
    /// renewal is abandoned. Wait on [`LifetimeWatcher::done`] to observe the
    /// exit. Idempotent.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.cancel.cancel();
        if !self.inner.started.load(Ordering::Acquire) {
            self.inner.done_tx.send_replace(Some(Ok(())));
        }
    }

    /// Takes the renewal event receiver. Returns `None` after the first call.
    pub fn renewals(&self) -> Option<LifetimeWatcherRenewals> {
        lock(&self.inner.renew_rx)
            .take()
            .map(|rx| LifetimeWatcherRenewals { rx })
    }

    /// Completion signal, resolved exactly once when the watcher exits.
    pub fn done(&self) -> LifetimeWatcherDone {
        LifetimeWatcherDone {
            rx: self.inner.done_tx.subscribe(),
        }
    }

    /// Whether [`LifetimeWatcher::stop`] was called.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }
}

impl Drop for LifetimeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Registry of live server sessions.
//!
//! Every per-connection task is spawned through a [`SessionRegistry`] so the
//! server can report how many sessions are open and, on shutdown, wait for
//! them or cancel the stragglers.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};

/// Outcome of draining the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every session ended on its own within the grace period.
    pub drained: bool,
    /// Sessions force-cancelled after the grace period.
    pub cancelled: usize,
}

/// Counted set of running session tasks.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    tracker: TaskTracker,
    cancel: CancellationToken,
    started: Arc<AtomicU64>,
}

impl SessionRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `session` as a tracked task and return its session id.
    ///
    /// The task runs inside an `ipc_session` span and is dropped at its next
    /// suspension point if the registry cancels outstanding sessions.
    pub fn spawn<F>(&self, session: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let session_id = self.started.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = self.cancel.clone();
        let span = info_span!("ipc_session", session_id);

        self.tracker.spawn(
            async move {
                tokio::select! {
                    () = cancel.cancelled() => debug!("session cancelled"),
                    () = session => {}
                }
            }
            .instrument(span),
        );

        session_id
    }

    /// Number of sessions still running.
    #[must_use]
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Total sessions spawned since the registry was created.
    #[must_use]
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Wait up to `grace` for every session to end, then cancel the rest.
    pub async fn drain(&self, grace: Duration) -> ShutdownReport {
        self.tracker.close();

        if time::timeout(grace, self.tracker.wait()).await.is_ok() {
            info!("all sessions ended within grace period");
            return ShutdownReport {
                drained: true,
                cancelled: 0,
            };
        }

        let cancelled = self.tracker.len();
        warn!(cancelled, "grace period elapsed, cancelling open sessions");
        self.cancel.cancel();
        self.tracker.wait().await;

        ShutdownReport {
            drained: false,
            cancelled,
        }
    }
}

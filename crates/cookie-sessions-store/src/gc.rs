//! Background GC task.

use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;

use crate::SessionManager;

/// Handle to a running background GC task.
///
/// The task sweeps once per period until [`stop`](Self::stop) is called or
/// the handle is dropped.
pub struct GcTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl GcTask {
    pub(crate) fn spawn(manager: Arc<SessionManager>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(period_secs = period.as_secs(), "Session GC task started");

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = manager.gc().await {
                            tracing::warn!(error = %e, "Session GC sweep failed");
                        }
                    }
                }
            }

            tracing::debug!("Session GC task stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Signal the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the task and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Session GC task ended abnormally");
            }
        }
    }
}

impl Drop for GcTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

//! Background re-authentication loop.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a spawned refresh loop.
///
/// The loop calls `tick`, sleeps for the delay it returns, and repeats
/// until the tick yields `None` or the handle is stopped. Cancellation
/// interrupts both the sleep and an in-flight tick.
pub struct RefreshTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    pub fn spawn<F, Fut>(label: String, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<Duration>> + Send,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = tick() => next,
                };
                let Some(delay) = next else { break };

                tracing::trace!(node = %label, delay_ms = delay.as_millis() as u64, "next refresh scheduled");
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            tracing::debug!(node = %label, "refresh loop stopped");
        });

        Self { cancel, handle }
    }

    /// Signal the loop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel and wait until the loop has exited.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                tracing::error!(error = %e, "refresh loop panicked");
            }
        }
    }
}

//! Trailing-edge throttle.
//!
//! The first value pushed opens a window. When the window closes the most
//! recent value is handed to the sink; values overwritten inside the window
//! are never delivered. Pushing never blocks.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) struct TrailingThrottle<T> {
    latest: watch::Sender<Option<T>>,
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T> TrailingThrottle<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawn the flush task. `sink` runs on the task, one call at a time.
    pub(crate) fn spawn<F, Fut>(window: Duration, mut sink: F) -> Self
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (latest, mut rx) = watch::channel::<Option<T>>(None);
        let stop = CancellationToken::new();
        let task_stop = stop.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = task_stop.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                tokio::select! {
                    biased;
                    _ = task_stop.cancelled() => break,
                    _ = tokio::time::sleep(window) => {}
                }
                let value = rx.borrow_and_update().clone();
                if let Some(value) = value {
                    sink(value).await;
                }
            }
        });

        Self {
            latest,
            stop,
            task: Some(task),
        }
    }

    pub(crate) fn push(&self, value: T) {
        self.latest.send_replace(Some(value));
    }

    /// Stop the flush task and wait for it. A value still waiting for its
    /// window to close is dropped; a sink call already running completes.
    /// A panicking sink is logged, not propagated.
    pub(crate) async fn finish(&mut self) {
        self.stop.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("progress flush task: {}", e);
            }
        }
    }
}

impl<T> Drop for TrailingThrottle<T> {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Errors surfaced by [`Dispatcher::schedule`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The queue worker is gone (its runtime shut down).
    #[error("Request queue is closed")]
    Closed,

    /// The task panicked before producing a value.
    #[error("Queued task aborted before completing")]
    Aborted,
}

/// Bounds of the random pause inserted after every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    /// Build a range; bounds given in the wrong order are swapped.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// A fixed pause.
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    /// Pick a uniformly random pause within the bounds.
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_millis(500))
    }
}

type Job = BoxFuture<'static, ()>;

/// Serial FIFO queue with a randomized inter-task pause.
///
/// Cloning shares the same queue. The worker stops once every clone is dropped.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Job>,
    delay: DelayRange,
}

impl Dispatcher {
    /// Start the queue worker. Must be called within a Tokio runtime.
    pub fn new(delay: DelayRange) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(rx, delay));
        Self { tx, delay }
    }

    pub fn delay(&self) -> DelayRange {
        self.delay
    }

    /// Enqueue `task` and return a future resolving to its output.
    ///
    /// The task is enqueued when `schedule` is called, not when the returned
    /// future is first polled, so call order is execution order. The returned
    /// future resolves as soon as the task finishes; the pause that follows
    /// only delays the next task.
    pub fn schedule<F, T>(
        &self,
        task: F,
    ) -> impl Future<Output = Result<T, DispatchError>> + Send + 'static
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let output = task.await;
            // The caller may have stopped waiting; the task still ran to completion.
            let _ = done_tx.send(output);
        });
        let enqueued = self.tx.send(job).map_err(|_| DispatchError::Closed);

        async move {
            enqueued?;
            done_rx.await.map_err(|_| DispatchError::Aborted)
        }
    }
}

async fn run_queue(mut rx: mpsc::UnboundedReceiver<Job>, delay: DelayRange) {
    let mut completed: u64 = 0;
    while let Some(job) = rx.recv().await {
        // Run on its own task so a panicking job cannot take the queue down.
        if let Err(e) = tokio::spawn(job).await {
            warn!(error = %e, "Queued task panicked");
        }
        completed += 1;

        let pause = delay.sample();
        debug!(completed, pause_ms = pause.as_millis() as u64, "Throttling before next task");
        tokio::time::sleep(pause).await;
    }
    debug!(completed, "Request queue closed");
}

//! Evaluation queue.
//!
//! Serializes asynchronous tasks: exactly one task runs at a time, in the
//! order they were submitted. A task that fails or panics settles only its
//! own [`TaskHandle`]; the worker moves on to the next one.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Why a queued task did not produce a value.
#[derive(Debug, Error)]
pub enum QueueError<E> {
    /// The task ran and returned an error.
    #[error("Task failed: {0}")]
    Task(E),

    /// The task panicked.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The queue shut down before the task settled.
    #[error("Evaluation queue closed")]
    Closed,
}

/// Completion handle for a submitted task.
///
/// Resolves once the task has settled, whether or not anything awaits it.
#[derive(Debug)]
pub struct TaskHandle<T, E> {
    id: u64,
    receiver: oneshot::Receiver<Result<T, QueueError<E>>>,
}

impl<T, E> TaskHandle<T, E> {
    /// Submission sequence number, starting at 0.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T, E> Future for TaskHandle<T, E> {
    type Output = Result<T, QueueError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|settled| settled.unwrap_or(Err(QueueError::Closed)))
    }
}

/// FIFO, concurrency-1 task runner.
#[derive(Debug)]
pub struct EvaluationQueue {
    sender: mpsc::UnboundedSender<Job>,
    in_flight: Arc<AtomicUsize>,
    next_id: AtomicU64,
    worker: JoinHandle<()>,
}

impl EvaluationQueue {
    /// Start the queue worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                job.await;
            }
            debug!("Evaluation queue worker stopped");
        });
        Self {
            sender,
            in_flight: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(0),
            worker,
        }
    }

    /// Queue a task behind everything submitted before it.
    pub fn submit<F, T, E>(&self, task: F) -> TaskHandle<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = oneshot::channel();
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        let counter = Arc::clone(&in_flight);
        let job: Job = Box::pin(async move {
            debug!(task = id, "Task started");
            let settled = match tokio::spawn(task).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => {
                    warn!(task = id, "Task returned an error");
                    Err(QueueError::Task(err))
                }
                Err(join) => settle_join_error(id, join),
            };
            counter.fetch_sub(1, Ordering::SeqCst);
            // Nobody may be waiting on the handle any more.
            let _ = reply.send(settled);
        });

        if self.sender.send(job).is_err() {
            in_flight.fetch_sub(1, Ordering::SeqCst);
            warn!(task = id, "Submitted to a closed evaluation queue");
        }
        TaskHandle { id, receiver }
    }

    /// Whether any submitted task has not settled yet.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.pending() > 0
    }

    /// Tasks submitted but not yet settled, including the one running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop accepting tasks and wait for the queued ones to finish.
    pub async fn shutdown(self) {
        let Self { sender, worker, .. } = self;
        drop(sender);
        if let Err(err) = worker.await {
            warn!(%err, "Evaluation queue worker did not stop cleanly");
        }
    }
}

impl Default for EvaluationQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn settle_join_error<T, E>(id: u64, join: JoinError) -> Result<T, QueueError<E>> {
    if !join.is_panic() {
        return Err(QueueError::Closed);
    }
    let payload = join.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    warn!(task = id, %message, "Task panicked");
    Err(QueueError::Panicked(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_returns_value() {
        let queue = EvaluationQueue::new();
        let handle = queue.submit(async { Ok::<_, String>(7) });
        assert_eq!(handle.id(), 0);
        assert_eq!(handle.await.unwrap(), 7);
        assert!(!queue.is_running());
    }

    #[tokio::test]
    async fn test_error_is_reported_to_its_handle() {
        let queue = EvaluationQueue::new();
        let handle = queue.submit(async { Err::<u32, _>("boom".to_string()) });
        match handle.await {
            Err(QueueError::Task(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pending_counts_unsettled() {
        let queue = EvaluationQueue::new();
        let (release, gate) = oneshot::channel::<()>();
        let first = queue.submit(async move {
            let _ = gate.await;
            Ok::<_, String>(1)
        });
        let second = queue.submit(async { Ok::<_, String>(2) });
        assert_eq!(queue.pending(), 2);
        assert!(queue.is_running());

        release.send(()).unwrap();
        assert_eq!(first.await.unwrap(), 1);
        assert_eq!(second.await.unwrap(), 2);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains() {
        let queue = EvaluationQueue::new();
        let handle = queue.submit(async { Ok::<_, String>("done") });
        queue.shutdown().await;
        assert_eq!(handle.await.unwrap(), "done");
    }
}

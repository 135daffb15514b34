//! Bounded-concurrency task queue
//!
//! Runs at most `concurrency` tasks at once on the tokio runtime. When a
//! running task settles, the next waiting task is spawned straight from the
//! completion path, so there is no polling delay and no round-based
//! batching. Waiting tasks start by priority (higher first), FIFO within a
//! priority.
//!
//! The queue never interrupts a task that has started. Cancellation is the
//! task's own business (see [`AbortSignal`](crate::signal::AbortSignal)).

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Concurrency limit, always at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Concurrency(usize);

impl Concurrency {
    /// Clamp a requested limit; values below 1 become 1
    pub fn new(requested: i64) -> Self {
        if requested < 1 {
            warn!(requested, "Concurrency below 1, using 1");
            return Self(1);
        }
        Self(usize::try_from(requested).unwrap_or(usize::MAX))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self(1)
    }
}

impl From<usize> for Concurrency {
    fn from(value: usize) -> Self {
        Self(value.max(1))
    }
}

impl From<i64> for Concurrency {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

/// Task did not produce a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),

    /// Removed by [`TaskQueue::clear`] or lost with the runtime
    #[error("task was dropped before completion")]
    Dropped,
}

struct Queued {
    priority: i32,
    seq: u64,
    job: Job,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // Max-heap: higher priority first, then lower sequence number.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    waiting: BinaryHeap<Queued>,
    running: usize,
    paused: bool,
    next_seq: u64,
}

struct QueueInner {
    concurrency: usize,
    state: Mutex<QueueState>,
    changed: Notify,
}

impl QueueInner {
    /// Start waiting jobs until the limit is reached
    fn dispatch(self: &Arc<Self>) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No tokio runtime available, queued tasks stay waiting");
                return;
            }
        };

        let ready: Vec<Job> = {
            let mut state = self.state.lock();
            let mut ready = Vec::new();
            while !state.paused && state.running < self.concurrency {
                match state.waiting.pop() {
                    Some(queued) => {
                        state.running += 1;
                        ready.push(queued.job);
                    }
                    None => break,
                }
            }
            ready
        };

        if ready.is_empty() {
            return;
        }

        debug!(started = ready.len(), "Dispatching queued tasks");
        for job in ready {
            let slot = SlotGuard {
                queue: Arc::clone(self),
            };
            handle.spawn(async move {
                let _slot = slot;
                job.await;
            });
        }
        self.changed.notify_waiters();
    }
}

/// Frees a slot when the job finishes, however it finishes.
struct SlotGuard {
    queue: Arc<QueueInner>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.queue.state.lock().running -= 1;
        self.queue.changed.notify_waiters();
        self.queue.dispatch();
    }
}

/// Result of one queued task
///
/// Dropping the handle does not cancel the task.
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Dropped)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Queue running at most `concurrency` tasks at a time
///
/// Cloning shares the queue.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

impl TaskQueue {
    pub fn new(concurrency: impl Into<Concurrency>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                concurrency: concurrency.into().get(),
                state: Mutex::new(QueueState::default()),
                changed: Notify::new(),
            }),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Queue a task with default priority 0
    pub fn add<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.add_with_priority(0, task)
    }

    pub fn add_with_priority<F, T>(&self, priority: i32, task: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let result = AssertUnwindSafe(task)
                .catch_unwind()
                .await
                .map_err(|payload| TaskError::Panicked(panic_message(payload)));
            let _ = tx.send(result);
        });

        {
            let mut state = self.inner.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.waiting.push(Queued { priority, seq, job });
        }
        self.inner.dispatch();

        TaskHandle { rx }
    }

    /// Run every task and return their results in input order
    ///
    /// Completion order does not matter. An empty input returns at once.
    pub async fn run_all<I, F, T>(&self, tasks: I) -> Vec<Result<T, TaskError>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<TaskHandle<T>> = tasks.into_iter().map(|task| self.add(task)).collect();
        futures::future::join_all(handles).await
    }

    /// Stop starting new tasks; running tasks continue
    pub fn pause(&self) {
        self.inner.state.lock().paused = true;
    }

    pub fn resume(&self) {
        self.inner.state.lock().paused = false;
        self.inner.dispatch();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    /// Tasks waiting to start
    pub fn size(&self) -> usize {
        self.inner.state.lock().waiting.len()
    }

    /// Tasks currently running
    pub fn pending(&self) -> usize {
        self.inner.state.lock().running
    }

    /// Drop every waiting task; their handles resolve to [`TaskError::Dropped`]
    pub fn clear(&self) -> usize {
        let dropped: Vec<Queued> = self.inner.state.lock().waiting.drain().collect();
        let count = dropped.len();
        drop(dropped);
        self.inner.changed.notify_waiters();
        count
    }

    /// Resolve once no task is waiting
    pub async fn on_empty(&self) {
        self.wait_until(|state| state.waiting.is_empty()).await
    }

    /// Resolve once nothing is waiting and nothing is running
    ///
    /// Never resolves while the queue is paused with tasks waiting.
    pub async fn on_idle(&self) {
        self.wait_until(|state| state.waiting.is_empty() && state.running == 0)
            .await
    }

    async fn wait_until(&self, condition: impl Fn(&QueueState) -> bool) {
        loop {
            let notified = self.inner.changed.notified();
            let done = condition(&self.inner.state.lock());
            if done {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TaskQueue")
            .field("concurrency", &self.inner.concurrency)
            .field("waiting", &state.waiting.len())
            .field("running", &state.running)
            .field("paused", &state.paused)
            .finish()
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.current.fetch_add(1, AtomicOrdering::SeqCst) + 1;
            self.peak.fetch_max(now, AtomicOrdering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, AtomicOrdering::SeqCst);
        }
    }

    #[test]
    fn test_concurrency_clamp() {
        assert_eq!(Concurrency::new(0).get(), 1);
        assert_eq!(Concurrency::new(-3).get(), 1);
        assert_eq!(Concurrency::new(4).get(), 4);
        assert_eq!(Concurrency::from(0usize).get(), 1);
        assert_eq!(TaskQueue::new(0usize).concurrency(), 1);
    }

    #[tokio::test]
    async fn test_empty_run_all() {
        let queue = TaskQueue::new(2usize);
        let results: Vec<Result<(), TaskError>> =
            queue.run_all(Vec::<futures::future::Ready<()>>::new()).await;
        assert!(results.is_empty());
        queue.on_idle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_respects_limit() {
        let queue = TaskQueue::new(3usize);
        let gauge = Arc::new(Gauge::default());

        let tasks = (0..10).map(|i| {
            let gauge = Arc::clone(&gauge);
            async move {
                gauge.enter();
                tokio::time::sleep(Duration::from_millis(10 + i)).await;
                gauge.exit();
                i
            }
        });
        let results = queue.run_all(tasks).await;

        assert_eq!(results.len(), 10);
        assert_eq!(gauge.peak.load(AtomicOrdering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preserves_input_order() {
        let queue = TaskQueue::new(4usize);
        let tasks = (0..8u64).map(|i| async move {
            tokio::time::sleep(Duration::from_millis(80 - i * 10)).await;
            i
        });

        let results: Vec<u64> = queue
            .run_all(tasks)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(results, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_task_starts_when_slot_frees() {
        let queue = TaskQueue::new(2usize);
        let origin = Instant::now();

        let fast = queue.add(tokio::time::sleep(Duration::from_millis(10)));
        let slow = queue.add(tokio::time::sleep(Duration::from_millis(100)));
        let third = queue.add(async move { origin.elapsed() });

        let started_after = third.await.unwrap();
        assert!(started_after >= Duration::from_millis(10));
        assert!(started_after < Duration::from_millis(100));

        fast.await.unwrap();
        slow.await.unwrap();
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let queue = TaskQueue::new(2usize);
        queue.pause();

        let started = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let started = Arc::clone(&started);
                queue.add(async move {
                    started.fetch_add(1, AtomicOrdering::SeqCst);
                })
            })
            .collect();

        tokio::task::yield_now().await;
        assert!(queue.is_paused());
        assert_eq!(started.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(queue.size(), 3);

        queue.resume();
        futures::future::join_all(handles).await;
        queue.on_idle().await;
        assert_eq!(started.load(AtomicOrdering::SeqCst), 3);
        assert_eq!(queue.size(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_priority_order() {
        let queue = TaskQueue::new(1usize);
        let (open_tx, open_rx) = oneshot::channel::<()>();
        let order = Arc::new(Mutex::new(Vec::new()));

        let gate = queue.add(async move {
            let _ = open_rx.await;
        });
        tokio::task::yield_now().await;

        for (label, priority) in [("low-1", 0), ("high-1", 5), ("low-2", 0), ("high-2", 5)] {
            let order = Arc::clone(&order);
            queue.add_with_priority(priority, async move {
                order.lock().push(label);
            });
        }

        let _ = open_tx.send(());
        gate.await.unwrap();
        queue.on_idle().await;
        assert_eq!(*order.lock(), vec!["high-1", "high-2", "low-1", "low-2"]);
    }

    #[tokio::test]
    async fn test_panic_is_reported_and_slot_freed() {
        let queue = TaskQueue::new(1usize);

        let panicking = queue.add(async {
            panic!("boom");
        });
        let next = queue.add(async { 7 });

        assert_eq!(
            panicking.await.unwrap_err(),
            TaskError::Panicked("boom".into())
        );
        assert_eq!(next.await.unwrap(), 7);
        queue.on_idle().await;
    }

    #[tokio::test]
    async fn test_clear_drops_waiting_tasks() {
        let queue = TaskQueue::new(1usize);
        let (open_tx, open_rx) = oneshot::channel::<()>();

        let running = queue.add(async move {
            let _ = open_rx.await;
            1
        });
        let waiting = queue.add(async { 2 });

        assert_eq!(queue.clear(), 1);
        assert_eq!(waiting.await.unwrap_err(), TaskError::Dropped);

        let _ = open_tx.send(());
        assert_eq!(running.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_on_empty_before_idle() {
        let queue = TaskQueue::new(1usize);
        let (open_tx, open_rx) = oneshot::channel::<()>();

        let _running = queue.add(async move {
            let _ = open_rx.await;
        });

        tokio::time::timeout(Duration::from_secs(1), queue.on_empty())
            .await
            .unwrap();
        assert_eq!(queue.pending(), 1);

        let _ = open_tx.send(());
        tokio::time::timeout(Duration::from_secs(1), queue.on_idle())
            .await
            .unwrap();
    }
}

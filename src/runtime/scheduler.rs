//! Rate-limited task scheduler.
//!
//! A single dispatcher drains a FIFO queue. Each dispatch needs a permit
//! from a semaphore sized `max_concurrent`, and two dispatches are never
//! closer than `min_interval`. Running tasks may overlap freely; only their
//! starts are spaced.
//!
//! Every submitted task resolves through its own [`TaskHandle`]. A task
//! that panics, whether while building its future or while polling it,
//! resolves as [`TaskOutcome::Panicked`] without touching its siblings or the
//! dispatcher.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::infrastructure::config::batch::SchedulerConfig;

type Job = Box<dyn FnOnce(OwnedSemaphorePermit) + Send>;

/// Concurrency and spacing limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerLimits {
    pub max_concurrent: usize,
    pub min_interval: Duration,
}

impl SchedulerLimits {
    #[must_use]
    pub const fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        Self {
            max_concurrent,
            min_interval,
        }
    }
}

impl From<&SchedulerConfig> for SchedulerLimits {
    fn from(config: &SchedulerConfig) -> Self {
        Self::new(config.max_concurrent, config.min_interval())
    }
}

/// How a scheduled task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    /// The task ran to completion and produced a value.
    Completed(T),
    /// The task panicked; the payload message is kept.
    Panicked(String),
    /// The task never ran because the scheduler shut down first.
    Cancelled,
}

impl<T> TaskOutcome<T> {
    /// The produced value, if the task completed.
    pub fn into_completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Receiving end for one task's outcome.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<TaskOutcome<T>>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task to reach a terminal state.
    pub async fn outcome(self) -> TaskOutcome<T> {
        // The sender is dropped without sending only when the job was
        // discarded before dispatch.
        self.rx.await.unwrap_or(TaskOutcome::Cancelled)
    }
}

/// Counters kept by the dispatcher and workers.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    dispatched: AtomicU64,
    discarded: AtomicU64,
    panicked: AtomicU64,
    running: AtomicUsize,
    peak_running: AtomicUsize,
    min_gap: Mutex<Option<Duration>>,
}

impl SchedulerStats {
    /// Tasks handed to a worker.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Tasks dropped without running because of shutdown.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::SeqCst)
    }

    /// Tasks that panicked.
    #[must_use]
    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::SeqCst)
    }

    /// Tasks currently running.
    #[must_use]
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously running tasks seen.
    #[must_use]
    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }

    /// Smallest observed spacing between two consecutive dispatches.
    #[must_use]
    pub fn min_dispatch_gap(&self) -> Option<Duration> {
        *self.min_gap.lock()
    }

    fn record_dispatch(&self, now: Instant, previous: Option<Instant>) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = previous {
            let gap = now.saturating_duration_since(previous);
            let mut min_gap = self.min_gap.lock();
            if min_gap.map_or(true, |current| gap < current) {
                *min_gap = Some(gap);
            }
        }
    }

    fn task_started(&self) {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(running, Ordering::SeqCst);
    }

    fn task_finished(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounded-concurrency, minimum-spacing task scheduler.
///
/// Must be created inside a Tokio runtime. Dropping the scheduler stops
/// accepting work but lets already-queued tasks run; call
/// [`shutdown`](Self::shutdown) to cancel the queue instead.
pub struct RateLimitedScheduler {
    limits: SchedulerLimits,
    queue: mpsc::UnboundedSender<Job>,
    shutdown: Arc<watch::Sender<bool>>,
    stats: Arc<SchedulerStats>,
}

impl RateLimitedScheduler {
    /// Create a scheduler and start its dispatcher.
    #[must_use]
    pub fn new(limits: SchedulerLimits) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(SchedulerStats::default());
        let semaphore = Arc::new(Semaphore::new(limits.max_concurrent.max(1)));

        tokio::spawn(dispatch_loop(
            rx,
            semaphore,
            limits.min_interval,
            shutdown_rx,
            stats.clone(),
        ));

        Self {
            limits,
            queue,
            shutdown: Arc::new(shutdown),
            stats,
        }
    }

    #[must_use]
    pub const fn limits(&self) -> SchedulerLimits {
        self.limits
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> Arc<SchedulerStats> {
        self.stats.clone()
    }

    /// Enqueue a task. Never blocks.
    ///
    /// After shutdown the returned handle resolves as
    /// [`TaskOutcome::Cancelled`].
    pub fn submit<F, Fut, T>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let stats = self.stats.clone();

        let job: Job = Box::new(move |permit| {
            tokio::spawn(async move {
                stats.task_started();
                // Calling `task` inside the inner spawn means a panic while
                // building the future is caught the same way as one while
                // polling it.
                let joined = tokio::spawn(async move { task().await }).await;
                stats.task_finished();
                drop(permit);

                let outcome = match joined {
                    Ok(value) => TaskOutcome::Completed(value),
                    Err(err) if err.is_panic() => {
                        stats.panicked.fetch_add(1, Ordering::SeqCst);
                        let message = panic_message(err.into_panic());
                        warn!(panic = %message, "Scheduled task panicked");
                        TaskOutcome::Panicked(message)
                    }
                    Err(_) => TaskOutcome::Cancelled,
                };
                let _ = tx.send(outcome);
            });
        });

        if self.queue.send(job).is_err() {
            self.stats.discarded.fetch_add(1, Ordering::SeqCst);
        }

        TaskHandle { rx }
    }

    /// Submit every task, then wait for all of them.
    ///
    /// Outcomes are returned in submission order.
    pub async fn run_all<I, F, Fut, T>(&self, tasks: I) -> Vec<TaskOutcome<T>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = tasks.into_iter().map(|task| self.submit(task)).collect();
        join_all(handles.into_iter().map(TaskHandle::outcome)).await
    }

    /// Stop dispatching. Queued tasks resolve as cancelled; running tasks
    /// finish normally.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// A cloneable handle that can shut the scheduler down from elsewhere.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Remote shutdown trigger for a [`RateLimitedScheduler`].
#[derive(Clone)]
pub struct ShutdownHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

async fn dispatch_loop(
    mut queue: mpsc::UnboundedReceiver<Job>,
    semaphore: Arc<Semaphore>,
    min_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<SchedulerStats>,
) {
    let mut last_dispatch: Option<Instant> = None;

    loop {
        let job = tokio::select! {
            biased;
            () = cancelled(&mut shutdown) => break,
            job = queue.recv() => match job {
                Some(job) => job,
                // Every sender is gone and the queue is drained.
                None => return,
            },
        };

        let permit = tokio::select! {
            biased;
            () = cancelled(&mut shutdown) => {
                drop(job);
                stats.discarded.fetch_add(1, Ordering::SeqCst);
                break;
            }
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        if let Some(last) = last_dispatch {
            let ready_at = last + min_interval;
            tokio::select! {
                biased;
                () = cancelled(&mut shutdown) => {
                    drop(job);
                    drop(permit);
                    stats.discarded.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                () = sleep_until(ready_at) => {}
            }
        }

        let now = Instant::now();
        stats.record_dispatch(now, last_dispatch);
        last_dispatch = Some(now);
        job(permit);
    }

    queue.close();
    let mut dropped = 0u64;
    while let Ok(job) = queue.try_recv() {
        drop(job);
        dropped += 1;
    }
    stats.discarded.fetch_add(dropped, Ordering::SeqCst);
    debug!(
        dispatched = stats.dispatched(),
        discarded = stats.discarded(),
        "Scheduler stopped dispatching"
    );
}

/// Resolves once shutdown has been requested. Never resolves if the
/// scheduler is dropped without a shutdown.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_concurrent: usize, min_interval_ms: u64) -> SchedulerLimits {
        SchedulerLimits::new(max_concurrent, Duration::from_millis(min_interval_ms))
    }

    #[tokio::test]
    async fn zero_tasks_completes_immediately() {
        let scheduler = RateLimitedScheduler::new(limits(2, 50));
        let tasks: Vec<fn() -> std::future::Ready<()>> = Vec::new();
        let outcomes = scheduler.run_all(tasks).await;
        assert!(outcomes.is_empty());
        assert_eq!(scheduler.stats().dispatched(), 0);
    }

    #[tokio::test]
    async fn outcomes_come_back_in_submission_order() {
        let scheduler = RateLimitedScheduler::new(limits(3, 0));
        let tasks = (0..6u64).map(|i| {
            move || async move {
                // Later tasks finish first.
                tokio::time::sleep(Duration::from_millis(30 - i * 5)).await;
                i
            }
        });
        let outcomes = scheduler.run_all(tasks).await;
        let values: Vec<u64> = outcomes
            .into_iter()
            .map(|o| o.into_completed().unwrap())
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn panic_is_isolated_to_its_handle() {
        let scheduler = RateLimitedScheduler::new(limits(2, 0));
        let ok = scheduler.submit(|| async { 1 });
        let boom = scheduler.submit(|| async {
            if true {
                panic!("boom");
            }
            2
        });
        let after = scheduler.submit(|| async { 3 });

        assert_eq!(ok.outcome().await, TaskOutcome::Completed(1));
        assert_eq!(boom.outcome().await, TaskOutcome::Panicked("boom".into()));
        assert_eq!(after.outcome().await, TaskOutcome::Completed(3));
        assert_eq!(scheduler.stats().panicked(), 1);
    }

    #[tokio::test]
    async fn panic_while_building_future_is_caught() {
        let scheduler = RateLimitedScheduler::new(limits(1, 0));
        let handle = scheduler.submit(|| -> std::future::Ready<u8> { panic!("sync failure") });
        assert_eq!(
            handle.outcome().await,
            TaskOutcome::Panicked("sync failure".into())
        );
        assert_eq!(scheduler.submit(|| async { 9u8 }).outcome().await, TaskOutcome::Completed(9));
    }

    #[tokio::test]
    async fn shutdown_cancels_queued_tasks() {
        let scheduler = RateLimitedScheduler::new(limits(1, 0));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = scheduler.submit(move || async move {
            let _ = release_rx.await;
            "first"
        });
        let queued: Vec<_> = (0..3)
            .map(|_| scheduler.submit(|| async { "queued" }))
            .collect();

        // Let the first task occupy the only permit.
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.shutdown();
        let _ = release_tx.send(());

        assert_eq!(first.outcome().await, TaskOutcome::Completed("first"));
        for handle in queued {
            assert_eq!(handle.outcome().await, TaskOutcome::Cancelled);
        }
        assert!(scheduler.is_shut_down());
        assert_eq!(
            scheduler.submit(|| async { "late" }).outcome().await,
            TaskOutcome::Cancelled
        );
    }

    #[tokio::test]
    async fn dropping_scheduler_still_runs_queued_tasks() {
        let handle = {
            let scheduler = RateLimitedScheduler::new(limits(1, 10));
            scheduler.submit(|| async { 5 })
        };
        assert_eq!(handle.outcome().await, TaskOutcome::Completed(5));
    }

    #[tokio::test]
    async fn stats_track_peak_and_spacing() {
        let scheduler = RateLimitedScheduler::new(limits(2, 15));
        let tasks = (0..5).map(|_| {
            || async {
                tokio::time::sleep(Duration::from_millis(40)).await;
            }
        });
        scheduler.run_all(tasks).await;

        let stats = scheduler.stats();
        assert_eq!(stats.dispatched(), 5);
        assert_eq!(stats.running(), 0);
        assert!(stats.peak_running() <= 2);
        assert!(stats.min_dispatch_gap().unwrap() >= Duration::from_millis(15));
    }
}

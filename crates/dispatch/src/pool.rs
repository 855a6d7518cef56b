// ABOUTME: Bounded worker pool with named threads, burst workers and a finite FIFO queue.
// ABOUTME: Full queues reject submissions instead of growing; panicking tasks never kill a worker.

//! The worker pool every dispatcher submits to.
//!
//! `min_workers` threads start when the pool is built and wait on a bounded
//! FIFO queue. When the queue is full, the pool starts a burst worker (up to
//! `max_workers`) that takes the job directly; once that limit is reached the
//! submission is rejected with [`ErrorCode::PoolSaturated`]. So at most
//! `queue_capacity + max_workers` jobs are in flight at once. Burst workers
//! that stay idle for `keep_alive` retire.
//!
//! Cancellation is advisory. A strategy that ignores its [`CancelToken`]
//! occupies its worker until it returns, so a burst of stuck strategies can
//! hold every worker. Size `max_workers` with that in mind.
//!
//! Dropping every `WorkerPool` handle does not stop the pool: workers keep a
//! reference to the queue and core workers stay parked until the process
//! exits. Call [`WorkerPool::shutdown`] to stop it.
//!
//! [`ErrorCode::PoolSaturated`]: crate::error::ErrorCode::PoolSaturated

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::error::DispatchError;
use crate::job::{CancelToken, Job, JobHandle};
use crate::options::PoolOptions;

/// Returns false when the job was skipped without running.
type Task = Box<dyn FnOnce() -> bool + Send + 'static>;

/// Snapshot of pool occupancy and counters.
///
/// `completed` counts tasks that ran to the end, `skipped` tasks cancelled
/// while still queued and `panicked` tasks that unwound past their job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub min_workers: usize,
    pub max_workers: usize,
    pub live_workers: usize,
    pub active_workers: usize,
    pub queued: usize,
    pub remaining_capacity: usize,
    pub completed: u64,
    pub skipped: u64,
    pub rejected: u64,
    pub panicked: u64,
}

/// Shared handle to a worker pool. Clones refer to the same pool.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    options: PoolOptions,
    sender: RwLock<Option<Sender<Task>>>,
    receiver: Receiver<Task>,
    live: AtomicUsize,
    active: AtomicUsize,
    thread_seq: AtomicUsize,
    completed: AtomicU64,
    skipped: AtomicU64,
    rejected: AtomicU64,
    panicked: AtomicU64,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("options", &self.inner.options)
            .field("stats", &self.stats())
            .finish()
    }
}

impl WorkerPool {
    /// Builds a pool and starts `min_workers` threads.
    pub fn new(options: PoolOptions) -> Result<Self, DispatchError> {
        options.validate()?;
        let (sender, receiver) = bounded::<Task>(options.queue_capacity);
        let pool = WorkerPool {
            inner: Arc::new(PoolInner {
                options,
                sender: RwLock::new(Some(sender)),
                receiver,
                live: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                thread_seq: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                panicked: AtomicU64::new(0),
                threads: Mutex::new(Vec::new()),
            }),
        };

        for _ in 0..pool.inner.options.min_workers {
            pool.inner.live.fetch_add(1, Ordering::SeqCst);
            if let Err(err) = pool.inner.spawn_worker(None) {
                pool.inner.live.fetch_sub(1, Ordering::SeqCst);
                pool.shutdown();
                return Err(err);
            }
        }

        info!(
            "worker pool started: prefix={} min={} max={} queue={} keep_alive={:?}",
            pool.inner.options.thread_prefix,
            pool.inner.options.min_workers,
            pool.inner.options.max_workers,
            pool.inner.options.queue_capacity,
            pool.inner.options.keep_alive
        );
        Ok(pool)
    }

    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    /// True if both handles refer to the same underlying pool.
    pub fn ptr_eq(&self, other: &WorkerPool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Submits a job and returns a handle to await its result.
    ///
    /// Fails with `PoolSaturated` when the queue is full and every worker
    /// slot is taken, or `PoolShutdown` after [`WorkerPool::shutdown`].
    pub fn submit(&self, job: Job) -> Result<JobHandle, DispatchError> {
        let cancel = CancelToken::new();
        let (tx, rx) = bounded(1);
        let handle = JobHandle::new(&job, cancel.clone(), rx);
        let strategy = job.strategy_id();
        let url = job.document.url.clone();

        let task: Task = Box::new(move || {
            let ran = !cancel.is_cancelled();
            let result = if ran {
                job.execute(&cancel)
            } else {
                debug!("skipping job {} ({}): cancelled while queued", job.id, strategy);
                Err(DispatchError::cancelled(&strategy, &job.document.url))
            };
            // The caller may have stopped waiting; a closed channel is fine.
            let _ = tx.send(result);
            ran
        });

        debug!(stats = ?self.stats(), "submitting job {}", handle.id());
        self.execute(task).map_err(|code| match code {
            Rejection::Saturated => DispatchError::saturated(handle.strategy(), &url),
            Rejection::Shutdown => DispatchError::shutdown(handle.strategy(), &url),
        })?;
        Ok(handle)
    }

    fn execute(&self, task: Task) -> Result<(), Rejection> {
        let inner = &self.inner;
        let guard = inner.sender.read();
        let sender = guard.as_ref().ok_or(Rejection::Shutdown)?;

        match sender.try_send(task) {
            Ok(()) => {
                // A pool with min_workers == 0 may have nobody left to drain the queue.
                if inner.live.load(Ordering::SeqCst) == 0 && inner.try_reserve_worker() {
                    if let Err(err) = inner.spawn_worker(None) {
                        inner.live.fetch_sub(1, Ordering::SeqCst);
                        error!("failed to start worker for queued job: {}", err);
                    }
                }
                Ok(())
            }
            Err(TrySendError::Full(task)) => {
                if inner.try_reserve_worker() {
                    match inner.spawn_worker(Some(task)) {
                        Ok(()) => return Ok(()),
                        Err(err) => {
                            inner.live.fetch_sub(1, Ordering::SeqCst);
                            error!("failed to start burst worker: {}", err);
                        }
                    }
                }
                inner.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "worker pool saturated: {} workers busy, queue full ({})",
                    inner.live.load(Ordering::SeqCst),
                    inner.options.queue_capacity
                );
                Err(Rejection::Saturated)
            }
            Err(TrySendError::Disconnected(_)) => Err(Rejection::Shutdown),
        }
    }

    pub fn stats(&self) -> PoolStats {
        let inner = &self.inner;
        let queued = inner.receiver.len();
        PoolStats {
            min_workers: inner.options.min_workers,
            max_workers: inner.options.max_workers,
            live_workers: inner.live.load(Ordering::SeqCst),
            active_workers: inner.active.load(Ordering::SeqCst),
            queued,
            remaining_capacity: inner.options.queue_capacity.saturating_sub(queued),
            completed: inner.completed.load(Ordering::Relaxed),
            skipped: inner.skipped.load(Ordering::Relaxed),
            rejected: inner.rejected.load(Ordering::Relaxed),
            panicked: inner.panicked.load(Ordering::Relaxed),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.sender.read().is_none()
    }

    /// Stops accepting work. Already queued jobs still run.
    ///
    /// Idempotent. For non-daemon pools this blocks until every worker has
    /// drained the queue and exited.
    pub fn shutdown(&self) {
        let sender = self.inner.sender.write().take();
        if sender.is_none() {
            return;
        }
        drop(sender);
        info!("worker pool {} shutting down", self.inner.options.thread_prefix);

        if !self.inner.options.daemon {
            self.join();
        }
    }

    /// Waits for every worker thread to exit. Only returns after `shutdown`.
    pub fn join(&self) {
        let current = thread::current().id();
        let handles: Vec<JoinHandle<()>> = self.inner.threads.lock().drain(..).collect();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("worker thread exited abnormally");
            }
        }
    }
}

enum Rejection {
    Saturated,
    Shutdown,
}

impl PoolInner {
    /// Claims a worker slot if fewer than `max_workers` are alive.
    fn try_reserve_worker(&self) -> bool {
        let max = self.options.max_workers;
        self.live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
                (live < max).then_some(live + 1)
            })
            .is_ok()
    }

    /// Gives up a worker slot if more than `min_workers` are alive.
    fn try_retire_worker(&self) -> bool {
        let min = self.options.min_workers;
        self.live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
                (live > min).then(|| live - 1)
            })
            .is_ok()
    }

    /// Starts a worker thread. The caller must already hold its slot in `live`.
    fn spawn_worker(self: &Arc<Self>, first: Option<Task>) -> Result<(), DispatchError> {
        let n = self.thread_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("{}-Thread-{}", self.options.thread_prefix, n);
        let inner = Arc::clone(self);
        let receiver = self.receiver.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || inner.worker_loop(receiver, first))
            .map_err(DispatchError::configuration_from)?;

        debug!("started worker {}", name);
        let mut threads = self.threads.lock();
        threads.retain(|h| !h.is_finished());
        threads.push(handle);
        Ok(())
    }

    fn worker_loop(&self, receiver: Receiver<Task>, first: Option<Task>) {
        if let Some(task) = first {
            self.run_task(task);
        }
        loop {
            match receiver.recv_timeout(self.options.keep_alive) {
                Ok(task) => self.run_task(task),
                Err(RecvTimeoutError::Timeout) => {
                    if self.try_retire_worker() {
                        // A job queued while we were retiring must not be stranded.
                        if !receiver.is_empty() && self.try_reserve_worker() {
                            continue;
                        }
                        trace!("idle worker retiring");
                        return;
                    }
                    // Core workers park until work arrives or the queue closes.
                    match receiver.recv() {
                        Ok(task) => self.run_task(task),
                        Err(_) => {
                            self.live.fetch_sub(1, Ordering::SeqCst);
                            return;
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.live.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
            }
        }
    }

    fn run_task(&self, task: Task) {
        self.active.fetch_add(1, Ordering::SeqCst);
        let counter = match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(true) => &self.completed,
            Ok(false) => &self.skipped,
            Err(_) => {
                error!("task panicked outside its job boundary; worker continues");
                &self.panicked
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ABOUTME: Job, CancelToken and JobHandle: one strategy applied to one document on the worker pool.
// ABOUTME: Jobs catch strategy panics and errors at their own boundary so workers never see them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::DispatchError;
use crate::result::{Extraction, StrategyId};
use crate::strategy::Strategy;

pub type JobId = u64;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// What a finished job reports back: data, nothing, or why it failed.
pub type JobResult = Result<Option<Extraction>, DispatchError>;

/// Cooperative cancellation signal shared between a caller and a running strategy.
///
/// Cancellation is advisory. A strategy that never checks the token keeps
/// its worker busy until it returns on its own.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    requests: AtomicUsize,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.inner.requests.fetch_add(1, Ordering::SeqCst);
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Number of times cancellation has been requested.
    pub fn cancel_requests(&self) -> usize {
        self.inner.requests.load(Ordering::SeqCst)
    }
}

/// A single strategy attempt against a document.
#[derive(Clone)]
pub struct Job {
    pub id: JobId,
    pub document: Arc<Document>,
    pub strategy: Arc<dyn Strategy>,
    pub submitted_at: DateTime<Utc>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("url", &self.document.url)
            .field("strategy", &self.strategy.id())
            .field("submitted_at", &self.submitted_at)
            .finish()
    }
}

impl Job {
    pub fn new(document: Arc<Document>, strategy: Arc<dyn Strategy>) -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            document,
            strategy,
            submitted_at: Utc::now(),
        }
    }

    pub fn strategy_id(&self) -> StrategyId {
        self.strategy.id().to_string()
    }

    /// Runs the strategy, converting errors, empty payloads and panics into a `JobResult`.
    ///
    /// Failures are logged here, at the per-strategy boundary, so that callers
    /// who dropped their handle still leave a trace.
    pub fn execute(&self, cancel: &CancelToken) -> JobResult {
        let strategy = self.strategy.id();
        let url = &self.document.url;
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.strategy.extract(&self.document, cancel)
        }));

        let result = match outcome {
            Ok(Ok(Some(extraction))) if !extraction.is_empty() => Ok(Some(extraction)),
            Ok(Ok(_)) => Ok(None),
            Ok(Err(err)) => {
                warn!("Error parsing {} with {}: {:#}", url, strategy, err);
                Err(DispatchError::fault(strategy, url.as_str(), Some(err)))
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                warn!("Strategy {} panicked on {}: {}", strategy, url, msg);
                Err(DispatchError::fault(
                    strategy,
                    url.as_str(),
                    Some(anyhow::anyhow!("panicked: {}", msg)),
                ))
            }
        };

        debug!(
            job = self.id,
            strategy,
            url = %url,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "job finished"
        );
        result
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Caller's side of a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    strategy: StrategyId,
    url: String,
    cancel: CancelToken,
    result: Receiver<JobResult>,
}

impl JobHandle {
    pub(crate) fn new(job: &Job, cancel: CancelToken, result: Receiver<JobResult>) -> Self {
        Self {
            id: job.id,
            strategy: job.strategy_id(),
            url: job.document.url.clone(),
            cancel,
            result,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Requests cooperative cancellation of the job.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits up to `timeout` for the job to finish.
    ///
    /// On timeout, cancellation is requested once and `StrategyTimeout` is
    /// returned; the worker may keep running the strategy regardless.
    pub fn try_await(&self, timeout: Duration) -> JobResult {
        match self.result.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.cancel.cancel();
                Err(DispatchError::timeout(&self.strategy, &self.url))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(DispatchError::shutdown(&self.strategy, &self.url))
            }
        }
    }

    /// Blocks until the job finishes.
    pub fn wait(&self) -> JobResult {
        self.result
            .recv()
            .unwrap_or_else(|_| Err(DispatchError::shutdown(&self.strategy, &self.url)))
    }
}

// ABOUTME: FanoutDispatcher submits every accepting strategy for a document to the worker pool.
// ABOUTME: Failures and rejections are isolated per strategy; the receipt may be awaited or dropped.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::document::Document;
use crate::job::{Job, JobHandle, JobResult};
use crate::pool::WorkerPool;
use crate::result::StrategyId;
use crate::strategy::{Strategy, StrategyRegistry};

/// Best-effort-all dispatcher.
///
/// No timeout is enforced: fanned-out strategies are independent consumers
/// and run to completion. There is no ordering among them.
#[derive(Debug, Clone)]
pub struct FanoutDispatcher {
    strategies: Arc<StrategyRegistry>,
    pool: WorkerPool,
}

/// What happened to each strategy of one fan-out.
#[derive(Debug, Default)]
pub struct FanoutReceipt {
    /// Jobs that made it into the pool.
    pub handles: Vec<JobHandle>,
    /// Strategies whose submission was refused (full queue or shut down pool).
    pub rejected: Vec<StrategyId>,
    /// Strategies that declined the document via `accepts`.
    pub skipped: Vec<StrategyId>,
}

impl FanoutReceipt {
    pub fn submitted(&self) -> usize {
        self.handles.len()
    }

    /// Blocks until every submitted job finishes. Outcomes are in submission order.
    pub fn wait(self) -> Vec<(StrategyId, JobResult)> {
        self.handles
            .into_iter()
            .map(|handle| {
                let result = handle.wait();
                (handle.strategy().to_string(), result)
            })
            .collect()
    }
}

impl FanoutDispatcher {
    pub fn new(strategies: Arc<StrategyRegistry>, pool: WorkerPool) -> Self {
        Self { strategies, pool }
    }

    /// Fans out to every registered strategy.
    pub fn dispatch_all(&self, document: &Document) -> FanoutReceipt {
        let all: Vec<Arc<dyn Strategy>> = self.strategies.iter().cloned().collect();
        self.dispatch(document, &all)
    }

    /// Submits one job per strategy that accepts the document.
    pub fn dispatch(&self, document: &Document, strategies: &[Arc<dyn Strategy>]) -> FanoutReceipt {
        let document = Arc::new(document.clone());
        let mut receipt = FanoutReceipt::default();

        for strategy in strategies {
            let id = strategy.id().to_string();
            if !strategy.accepts(&document) {
                debug!("{} does not accept {}", id, document.url);
                receipt.skipped.push(id);
                continue;
            }

            match self.pool.submit(Job::new(Arc::clone(&document), Arc::clone(strategy))) {
                Ok(handle) => receipt.handles.push(handle),
                Err(err) => {
                    warn!("Dropping {} for {}: {}", id, document.url, err);
                    receipt.rejected.push(id);
                }
            }
        }

        debug!(
            url = %document.url,
            submitted = receipt.handles.len(),
            rejected = receipt.rejected.len(),
            skipped = receipt.skipped.len(),
            "fan-out submitted"
        );
        receipt
    }
}

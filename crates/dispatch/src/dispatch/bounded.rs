// ABOUTME: BoundedDispatcher tries preferred strategies in order with a per-attempt timeout.
// ABOUTME: The first non-empty result wins; everything else falls through to the next strategy.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::document::Document;
use crate::job::{CancelToken, Job, JobResult};
use crate::options::ParseTimeout;
use crate::pool::WorkerPool;
use crate::preference::PreferenceModel;
use crate::result::{AttemptOutcome, AttemptRecord, DispatchResult, EmptyReason, Extraction};
use crate::strategy::{Strategy, StrategyRegistry};

/// Ordered-fallback dispatcher.
///
/// Stateless between calls and safe to share across threads. Strategies are
/// attempted strictly in preference order; the first one producing a
/// non-empty extraction wins and later strategies are never consulted.
#[derive(Debug, Clone)]
pub struct BoundedDispatcher {
    preferences: Arc<PreferenceModel>,
    strategies: Arc<StrategyRegistry>,
    pool: WorkerPool,
    timeout: ParseTimeout,
}

enum Attempt {
    Found(Extraction),
    Missed(AttemptOutcome),
}

impl BoundedDispatcher {
    pub fn new(
        preferences: Arc<PreferenceModel>,
        strategies: Arc<StrategyRegistry>,
        pool: WorkerPool,
        timeout: ParseTimeout,
    ) -> Self {
        Self {
            preferences,
            strategies,
            pool,
            timeout,
        }
    }

    pub fn timeout(&self) -> ParseTimeout {
        self.timeout
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Dispatches using the document's own content type.
    pub fn dispatch_document(&self, document: &Document) -> DispatchResult {
        self.dispatch(document, &document.content_type)
    }

    /// Tries the strategies preferred for `content_type` until one yields data.
    pub fn dispatch(&self, document: &Document, content_type: &str) -> DispatchResult {
        let ids = self.preferences.lookup(content_type);
        if ids.is_empty() {
            warn!(
                "No suitable strategy found when trying to parse content {} of type {}",
                document.url, content_type
            );
            return DispatchResult::empty(EmptyReason::NoStrategyConfigured, Vec::new());
        }

        let document = Arc::new(document.clone());
        let mut attempts = Vec::with_capacity(ids.len());

        for id in ids {
            debug!("Parsing [{}] with [{}]", document.url, id);
            let Some(strategy) = self.strategies.get(id) else {
                warn!("strategy {} is configured but not registered, skipping", id);
                attempts.push(AttemptRecord {
                    strategy: id.clone(),
                    outcome: AttemptOutcome::Unregistered,
                });
                continue;
            };

            match self.attempt(&document, strategy) {
                Attempt::Found(payload) => {
                    return DispatchResult::Success {
                        strategy: id.clone(),
                        payload,
                    }
                }
                Attempt::Missed(outcome) => attempts.push(AttemptRecord {
                    strategy: id.clone(),
                    outcome,
                }),
            }
        }

        warn!(
            "Unable to successfully parse content {} of type {}",
            document.url, content_type
        );
        DispatchResult::empty(EmptyReason::AllStrategiesExhausted, attempts)
    }

    /// Runs one named strategy, bypassing the preference model.
    ///
    /// Unlike [`dispatch`](Self::dispatch), a timeout or a rejected submission
    /// is the final answer and is reported as such.
    pub fn dispatch_by_id(&self, strategy_id: &str, document: &Document) -> DispatchResult {
        let Some(strategy) = self.strategies.get(strategy_id) else {
            warn!(
                "No strategy registered under {} for content {}",
                strategy_id, document.url
            );
            return DispatchResult::empty(EmptyReason::NoStrategyConfigured, Vec::new());
        };

        let document = Arc::new(document.clone());
        let outcome = match self.attempt(&document, strategy) {
            Attempt::Found(payload) => {
                return DispatchResult::Success {
                    strategy: strategy_id.to_string(),
                    payload,
                }
            }
            Attempt::Missed(outcome) => outcome,
        };

        match outcome {
            AttemptOutcome::TimedOut => DispatchResult::Timeout {
                strategy: strategy_id.to_string(),
            },
            AttemptOutcome::Rejected | AttemptOutcome::Shutdown => DispatchResult::Rejected {
                strategy: strategy_id.to_string(),
            },
            other => DispatchResult::empty(
                EmptyReason::AllStrategiesExhausted,
                vec![AttemptRecord {
                    strategy: strategy_id.to_string(),
                    outcome: other,
                }],
            ),
        }
    }

    fn attempt(&self, document: &Arc<Document>, strategy: Arc<dyn Strategy>) -> Attempt {
        let job = Job::new(Arc::clone(document), strategy);
        let result: JobResult = match self.timeout {
            ParseTimeout::Disabled => job.execute(&CancelToken::new()),
            ParseTimeout::Bounded(limit) => match self.pool.submit(job) {
                Ok(handle) => handle.try_await(limit),
                Err(err) => Err(err),
            },
        };

        match result {
            Ok(Some(payload)) => Attempt::Found(payload),
            Ok(None) => Attempt::Missed(AttemptOutcome::Empty),
            Err(err) => {
                // Faults were already logged by the job itself.
                if !err.is_fault() {
                    warn!("Failed to parse {}: {}", document.url, err);
                }
                Attempt::Missed(AttemptOutcome::from_error(&err))
            }
        }
    }
}

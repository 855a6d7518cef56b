// ABOUTME: Extraction payload produced by strategies and the DispatchResult returned by dispatchers.
// ABOUTME: Includes the per-attempt trail recorded while falling back through strategies.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, ErrorCode};

/// Identifier of one extraction strategy.
pub type StrategyId = String;

/// Structured data extracted from a document.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Extraction {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Extraction {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Returns true if nothing was extracted. Empty extractions count as "no result".
    pub fn is_empty(&self) -> bool {
        self.title.as_ref().map_or(true, |t| t.is_empty())
            && self.text.is_empty()
            && self.fields.is_empty()
    }
}

/// Why a dispatch ended without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    NoStrategyConfigured,
    AllStrategiesExhausted,
}

impl EmptyReason {
    pub fn code(&self) -> ErrorCode {
        match self {
            EmptyReason::NoStrategyConfigured => ErrorCode::NoStrategyAvailable,
            EmptyReason::AllStrategiesExhausted => ErrorCode::AllStrategiesExhausted,
        }
    }
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::NoStrategyConfigured => write!(f, "no strategy configured"),
            EmptyReason::AllStrategiesExhausted => write!(f, "no strategy succeeded"),
        }
    }
}

/// What happened to one strategy attempt that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Ran to completion without producing data.
    Empty,
    TimedOut,
    Fault(String),
    /// The worker pool queue was full.
    Rejected,
    /// Configured in the preference list but absent from the registry.
    Unregistered,
    Cancelled,
    Shutdown,
}

impl AttemptOutcome {
    /// Maps a failed attempt's error to its outcome.
    pub fn from_error(err: &DispatchError) -> Self {
        match err.code {
            ErrorCode::StrategyTimeout => AttemptOutcome::TimedOut,
            ErrorCode::PoolSaturated => AttemptOutcome::Rejected,
            ErrorCode::PoolShutdown => AttemptOutcome::Shutdown,
            ErrorCode::Cancelled => AttemptOutcome::Cancelled,
            _ => AttemptOutcome::Fault(
                err.source
                    .as_ref()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| err.code.to_string()),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub strategy: StrategyId,
    pub outcome: AttemptOutcome,
}

/// Outcome of a dispatch. Failures are values, never panics or errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchResult {
    Success {
        strategy: StrategyId,
        payload: Extraction,
    },
    EmptyFailure {
        reason: EmptyReason,
        attempts: Vec<AttemptRecord>,
    },
    /// A single-strategy dispatch ran out of time.
    Timeout { strategy: StrategyId },
    /// A single-strategy dispatch could not be queued.
    Rejected { strategy: StrategyId },
}

impl DispatchResult {
    pub fn empty(reason: EmptyReason, attempts: Vec<AttemptRecord>) -> Self {
        DispatchResult::EmptyFailure { reason, attempts }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DispatchResult::Success { .. })
    }

    pub fn payload(&self) -> Option<&Extraction> {
        match self {
            DispatchResult::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// The strategy that produced the payload.
    pub fn strategy(&self) -> Option<&str> {
        match self {
            DispatchResult::Success { strategy, .. } => Some(strategy),
            _ => None,
        }
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            DispatchResult::EmptyFailure { attempts, .. } => attempts,
            _ => &[],
        }
    }

    /// Converts into a `Result` for callers that prefer `?`.
    pub fn into_result(self, url: &str) -> Result<(StrategyId, Extraction), DispatchError> {
        match self {
            DispatchResult::Success { strategy, payload } => Ok((strategy, payload)),
            DispatchResult::EmptyFailure { reason, .. } => Err(match reason {
                EmptyReason::NoStrategyConfigured => DispatchError::no_strategy(url),
                EmptyReason::AllStrategiesExhausted => DispatchError::exhausted(url),
            }),
            DispatchResult::Timeout { strategy } => Err(DispatchError::timeout(strategy, url)),
            DispatchResult::Rejected { strategy } => Err(DispatchError::saturated(strategy, url)),
        }
    }
}

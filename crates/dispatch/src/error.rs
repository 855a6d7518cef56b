// ABOUTME: Error types for the dispatch engine including the ErrorCode enum and DispatchError struct.
// ABOUTME: Provides categorized errors with convenience constructors and boolean helpers.

use std::fmt;

/// Error codes representing the categories of dispatch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Configuration,
    NoStrategyAvailable,
    AllStrategiesExhausted,
    StrategyTimeout,
    StrategyFault,
    PoolSaturated,
    PoolShutdown,
    Cancelled,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::Configuration => "configuration error",
            ErrorCode::NoStrategyAvailable => "no strategy configured",
            ErrorCode::AllStrategiesExhausted => "no strategy succeeded",
            ErrorCode::StrategyTimeout => "timeout",
            ErrorCode::StrategyFault => "strategy fault",
            ErrorCode::PoolSaturated => "worker pool saturated",
            ErrorCode::PoolShutdown => "worker pool shut down",
            ErrorCode::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// The main error type for dispatch operations.
///
/// `strategy` names the strategy involved (empty when the error is not tied
/// to one) and `url` the document being processed (empty for configuration
/// errors).
#[derive(Debug, thiserror::Error)]
pub struct DispatchError {
    pub code: ErrorCode,
    pub strategy: String,
    pub url: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "strata: ")?;
        if !self.strategy.is_empty() {
            write!(f, "{} ", self.strategy)?;
        }
        if !self.url.is_empty() {
            write!(f, "{}: ", self.url)?;
        }
        write!(f, "{}", self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl DispatchError {
    fn new(
        code: ErrorCode,
        strategy: impl Into<String>,
        url: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            strategy: strategy.into(),
            url: url.into(),
            source,
        }
    }

    /// Create a Configuration error (malformed options or preference source).
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Configuration,
            "",
            "",
            Some(anyhow::anyhow!(msg.into())),
        )
    }

    /// Create a Configuration error wrapping an underlying cause.
    pub fn configuration_from(source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorCode::Configuration, "", "", Some(source.into()))
    }

    /// Create a NoStrategyAvailable error.
    pub fn no_strategy(url: impl Into<String>) -> Self {
        Self::new(ErrorCode::NoStrategyAvailable, "", url, None)
    }

    /// Create an AllStrategiesExhausted error.
    pub fn exhausted(url: impl Into<String>) -> Self {
        Self::new(ErrorCode::AllStrategiesExhausted, "", url, None)
    }

    /// Create a StrategyTimeout error.
    pub fn timeout(strategy: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(ErrorCode::StrategyTimeout, strategy, url, None)
    }

    /// Create a StrategyFault error.
    pub fn fault(
        strategy: impl Into<String>,
        url: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::StrategyFault, strategy, url, source)
    }

    /// Create a PoolSaturated error.
    pub fn saturated(strategy: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(ErrorCode::PoolSaturated, strategy, url, None)
    }

    /// Create a PoolShutdown error.
    pub fn shutdown(strategy: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(ErrorCode::PoolShutdown, strategy, url, None)
    }

    /// Create a Cancelled error.
    pub fn cancelled(strategy: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, strategy, url, None)
    }

    /// Returns true if this is a Configuration error.
    pub fn is_configuration(&self) -> bool {
        self.code == ErrorCode::Configuration
    }

    /// Returns true if this is a StrategyTimeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::StrategyTimeout
    }

    /// Returns true if this is a StrategyFault error.
    pub fn is_fault(&self) -> bool {
        self.code == ErrorCode::StrategyFault
    }

    /// Returns true if this is a PoolSaturated error.
    pub fn is_saturated(&self) -> bool {
        self.code == ErrorCode::PoolSaturated
    }

    /// Returns true if this is a PoolShutdown error.
    pub fn is_shutdown(&self) -> bool {
        self.code == ErrorCode::PoolShutdown
    }

    /// Returns true if this is a Cancelled error.
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }

    /// Returns true for the terminal "nothing extracted" codes.
    pub fn is_empty_failure(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::NoStrategyAvailable | ErrorCode::AllStrategiesExhausted
        )
    }
}

// ABOUTME: Configuration options for the dispatch engine: ParseTimeout, PoolOptions, DispatchOptions.
// ABOUTME: OptionsBuilder provides a fluent API; from_properties reads the flat parser.* keys.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tracing::warn;

use crate::error::DispatchError;

/// Default per-attempt parse timeout in seconds.
pub const DEFAULT_PARSE_TIMEOUT_SECS: u64 = 30;
/// Default number of eagerly started workers.
pub const DEFAULT_MIN_WORKERS: usize = 4;
/// Default upper bound on worker threads.
pub const DEFAULT_MAX_WORKERS: usize = 32;
/// Default capacity of the bounded work queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 2048;
/// Default idle time before a burst worker retires, in seconds.
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
/// Default worker thread name prefix.
pub const DEFAULT_THREAD_PREFIX: &str = "HTML-Parser";

/// Property key for the per-attempt timeout in seconds (negative disables).
pub const KEY_TIMEOUT: &str = "parser.timeout";
pub const KEY_MIN_THREAD: &str = "parser.minThread";
pub const KEY_MAX_THREAD: &str = "parser.maxThread";
pub const KEY_WORK_QUEUE_SIZE: &str = "parser.workQueueSize";
pub const KEY_KEEP_ALIVE_TIME: &str = "parser.keepAliveTime";

/// How long a single strategy attempt may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTimeout {
    /// Run on the worker pool and give up after the duration.
    Bounded(Duration),
    /// Bypass the pool and run inline on the calling thread, without a timeout.
    /// Intended for debugging.
    Disabled,
}

impl Default for ParseTimeout {
    fn default() -> Self {
        ParseTimeout::Bounded(Duration::from_secs(DEFAULT_PARSE_TIMEOUT_SECS))
    }
}

impl ParseTimeout {
    /// Interprets a seconds value where any negative number means disabled.
    pub fn from_secs(secs: i64) -> Self {
        if secs < 0 {
            ParseTimeout::Disabled
        } else {
            ParseTimeout::Bounded(Duration::from_secs(secs as u64))
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, ParseTimeout::Disabled)
    }
}

impl fmt::Display for ParseTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseTimeout::Bounded(d) => write!(f, "{}ms", d.as_millis()),
            ParseTimeout::Disabled => write!(f, "disabled"),
        }
    }
}

/// Sizing and naming of the shared worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    pub min_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    pub keep_alive: Duration,
    pub thread_prefix: String,
    /// When false, shutting the pool down blocks until every worker exits.
    pub daemon: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min_workers: DEFAULT_MIN_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
            thread_prefix: DEFAULT_THREAD_PREFIX.to_string(),
            daemon: true,
        }
    }
}

impl PoolOptions {
    /// Checks the sizing invariants `1 <= max_workers` and `min_workers <= max_workers`.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.max_workers == 0 {
            return Err(DispatchError::configuration(
                "max_workers must be at least 1",
            ));
        }
        if self.min_workers > self.max_workers {
            return Err(DispatchError::configuration(format!(
                "min_workers ({}) exceeds max_workers ({})",
                self.min_workers, self.max_workers
            )));
        }
        Ok(())
    }
}

/// Complete configuration for the dispatchers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchOptions {
    pub pool: PoolOptions,
    pub parse_timeout: ParseTimeout,
}

impl DispatchOptions {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    /// Reads options from flat `parser.*` properties.
    ///
    /// Missing keys keep their defaults. A value that does not parse is
    /// logged and the default is kept.
    pub fn from_properties(props: &HashMap<String, String>) -> Self {
        let defaults = DispatchOptions::default();
        let mut builder = OptionsBuilder::new();

        if let Some(secs) = read_prop::<i64>(props, KEY_TIMEOUT) {
            builder = builder.parse_timeout(ParseTimeout::from_secs(secs));
        }
        builder = builder
            .min_workers(read_prop(props, KEY_MIN_THREAD).unwrap_or(defaults.pool.min_workers))
            .max_workers(read_prop(props, KEY_MAX_THREAD).unwrap_or(defaults.pool.max_workers))
            .queue_capacity(
                read_prop(props, KEY_WORK_QUEUE_SIZE).unwrap_or(defaults.pool.queue_capacity),
            );
        if let Some(secs) = read_prop::<u64>(props, KEY_KEEP_ALIVE_TIME) {
            builder = builder.keep_alive(Duration::from_secs(secs));
        }
        builder.build()
    }
}

fn read_prop<T: std::str::FromStr>(props: &HashMap<String, String>, key: &str) -> Option<T> {
    let raw = props.get(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring malformed value {:?} for {}, using default", raw, key);
            None
        }
    }
}

/// Builder for constructing DispatchOptions with custom settings.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    opts: DispatchOptions,
}

impl OptionsBuilder {
    /// Create a new OptionsBuilder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers started eagerly.
    pub fn min_workers(mut self, n: usize) -> Self {
        self.opts.pool.min_workers = n;
        self
    }

    /// Set the maximum number of workers.
    pub fn max_workers(mut self, n: usize) -> Self {
        self.opts.pool.max_workers = n;
        self
    }

    /// Set the capacity of the bounded work queue.
    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.opts.pool.queue_capacity = n;
        self
    }

    /// Set how long an idle burst worker lingers before retiring.
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.opts.pool.keep_alive = keep_alive;
        self
    }

    /// Set the worker thread name prefix.
    pub fn thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.opts.pool.thread_prefix = prefix.into();
        self
    }

    /// Mark workers as daemon (shutdown does not wait for them).
    pub fn daemon(mut self, daemon: bool) -> Self {
        self.opts.pool.daemon = daemon;
        self
    }

    /// Set the per-attempt timeout.
    pub fn parse_timeout(mut self, timeout: ParseTimeout) -> Self {
        self.opts.parse_timeout = timeout;
        self
    }

    /// Shorthand for a bounded per-attempt timeout.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.parse_timeout(ParseTimeout::Bounded(timeout))
    }

    pub fn build(self) -> DispatchOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_documented_values() {
        let opts = DispatchOptions::default();
        assert_eq!(opts.pool.min_workers, 4);
        assert_eq!(opts.pool.max_workers, 32);
        assert_eq!(opts.pool.queue_capacity, 2048);
        assert_eq!(opts.pool.keep_alive, Duration::from_secs(60));
        assert_eq!(opts.pool.thread_prefix, "HTML-Parser");
        assert!(opts.pool.daemon);
        assert_eq!(
            opts.parse_timeout,
            ParseTimeout::Bounded(Duration::from_secs(30))
        );
    }

    #[test]
    fn from_properties_reads_all_keys() {
        let opts = DispatchOptions::from_properties(&props(&[
            ("parser.timeout", "5"),
            ("parser.minThread", "2"),
            ("parser.maxThread", "8"),
            ("parser.workQueueSize", "16"),
            ("parser.keepAliveTime", "10"),
        ]));
        assert_eq!(opts.parse_timeout, ParseTimeout::Bounded(Duration::from_secs(5)));
        assert_eq!(opts.pool.min_workers, 2);
        assert_eq!(opts.pool.max_workers, 8);
        assert_eq!(opts.pool.queue_capacity, 16);
        assert_eq!(opts.pool.keep_alive, Duration::from_secs(10));
    }

    #[test]
    fn negative_timeout_disables() {
        let opts = DispatchOptions::from_properties(&props(&[("parser.timeout", "-1")]));
        assert!(opts.parse_timeout.is_disabled());
    }

    #[test]
    fn malformed_property_falls_back_to_default() {
        let opts = DispatchOptions::from_properties(&props(&[
            ("parser.maxThread", "lots"),
            ("parser.timeout", "soon"),
        ]));
        assert_eq!(opts.pool.max_workers, DEFAULT_MAX_WORKERS);
        assert_eq!(opts.parse_timeout, ParseTimeout::default());
    }

    #[test]
    fn validate_rejects_inverted_sizes() {
        let opts = DispatchOptions::builder()
            .min_workers(8)
            .max_workers(2)
            .build();
        let err = opts.pool.validate().unwrap_err();
        assert!(err.is_configuration());

        let zero = DispatchOptions::builder().min_workers(0).max_workers(0).build();
        assert!(zero.pool.validate().is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let opts = DispatchOptions::builder()
            .thread_prefix("Item-Parser")
            .daemon(false)
            .timeout(Duration::from_millis(250))
            .build();
        assert_eq!(opts.pool.thread_prefix, "Item-Parser");
        assert!(!opts.pool.daemon);
        assert_eq!(opts.parse_timeout.to_string(), "250ms");
    }
}

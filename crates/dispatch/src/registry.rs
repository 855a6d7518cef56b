// ABOUTME: Process-wide PoolRegistry holding the single shared WorkerPool.
// ABOUTME: Initialized once by an explicit startup call; torn down only by an explicit shutdown.

//! The shared worker pool.
//!
//! The owning process calls [`PoolRegistry::initialize`] once at startup with
//! the pool configuration. Concurrent first-time callers build exactly one
//! pool. A later call with *different* options is refused instead of
//! silently handing back a pool sized for someone else; a call with the same
//! options returns the existing pool.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::DispatchError;
use crate::options::PoolOptions;
use crate::pool::WorkerPool;

static SHARED_POOL: Lazy<RwLock<Option<WorkerPool>>> = Lazy::new(|| RwLock::new(None));

/// Accessor for the process-wide worker pool.
pub struct PoolRegistry;

impl PoolRegistry {
    /// Builds the shared pool, or returns it if it already exists with the same options.
    ///
    /// Fails with `Configuration` when a pool with different options is
    /// already running, or when `options` are invalid.
    pub fn initialize(options: PoolOptions) -> Result<WorkerPool, DispatchError> {
        // Fast path: shared read lock
        {
            let slot = SHARED_POOL.read();
            if let Some(pool) = slot.as_ref() {
                return Self::reuse(pool, &options);
            }
        }

        // Slow path: build under the write lock
        let mut slot = SHARED_POOL.write();
        // Double-check after acquiring write lock (another thread may have built it)
        if let Some(pool) = slot.as_ref() {
            return Self::reuse(pool, &options);
        }
        let pool = WorkerPool::new(options)?;
        *slot = Some(pool.clone());
        info!("shared worker pool initialized");
        Ok(pool)
    }

    fn reuse(pool: &WorkerPool, requested: &PoolOptions) -> Result<WorkerPool, DispatchError> {
        if pool.options() == requested {
            return Ok(pool.clone());
        }
        warn!(
            "shared worker pool already initialized with {:?}; refusing {:?}",
            pool.options(),
            requested
        );
        Err(DispatchError::configuration(
            "shared worker pool already initialized with different options",
        ))
    }

    /// Returns the shared pool. Fails with `Configuration` if nobody initialized it.
    pub fn shared() -> Result<WorkerPool, DispatchError> {
        SHARED_POOL
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| DispatchError::configuration("shared worker pool not initialized"))
    }

    pub fn is_initialized() -> bool {
        SHARED_POOL.read().is_some()
    }

    /// Shuts the shared pool down and clears the slot.
    ///
    /// Idempotent: returns false when there was no pool. After this, a new
    /// `initialize` call may build a fresh pool.
    pub fn shutdown() -> bool {
        let pool = SHARED_POOL.write().take();
        match pool {
            Some(pool) => {
                pool.shutdown();
                true
            }
            None => false,
        }
    }
}

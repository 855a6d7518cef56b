// ABOUTME: Main library entry point for the strata content dispatch engine.
// ABOUTME: Re-exports the public API: dispatchers, WorkerPool, PoolRegistry, PreferenceModel, Strategy, results and errors.

//! Strata - content-type driven extraction dispatch.
//!
//! Documents are routed to pluggable extraction strategies. A
//! [`BoundedDispatcher`] tries the strategies preferred for a content type in
//! order, each under a timeout, and returns the first non-empty result. A
//! [`FanoutDispatcher`] hands a document to every accepting strategy at once.
//! Both run strategies on a shared bounded [`WorkerPool`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata_dispatch::{
//!     builtin_registry, load_builtin_preferences, BoundedDispatcher, DispatchError,
//!     DispatchOptions, Document, WorkerPool,
//! };
//!
//! fn main() -> Result<(), DispatchError> {
//!     let options = DispatchOptions::default();
//!     let pool = WorkerPool::new(options.pool.clone())?;
//!     let dispatcher = BoundedDispatcher::new(
//!         Arc::new(load_builtin_preferences()?),
//!         Arc::new(builtin_registry()),
//!         pool.clone(),
//!         options.parse_timeout,
//!     );
//!     let doc = Document::new("https://example.com/", "text/html", "<title>Hi</title>");
//!     if let Some(payload) = dispatcher.dispatch_document(&doc).payload() {
//!         println!("{:?}", payload.title);
//!     }
//!     pool.shutdown();
//!     Ok(())
//! }
//! ```

pub mod builtin;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod job;
pub mod options;
pub mod pool;
pub mod preference;
pub mod registry;
pub mod result;
pub mod strategy;

pub use crate::builtin::builtin_registry;
pub use crate::dispatch::{BoundedDispatcher, FanoutDispatcher, FanoutReceipt};
pub use crate::document::{normalize_content_type, Document};
pub use crate::error::{DispatchError, ErrorCode};
pub use crate::job::{CancelToken, Job, JobHandle, JobId, JobResult};
pub use crate::options::{DispatchOptions, OptionsBuilder, ParseTimeout, PoolOptions};
pub use crate::pool::{PoolStats, WorkerPool};
pub use crate::preference::{
    load_builtin_preferences, PreferenceModel, PreferenceSource, StrategyDecl,
};
pub use crate::registry::PoolRegistry;
pub use crate::result::{
    AttemptOutcome, AttemptRecord, DispatchResult, EmptyReason, Extraction, StrategyId,
};
pub use crate::strategy::{FnStrategy, Strategy, StrategyRegistry, UrlFilter};

// ABOUTME: Dispatch module root: ordered-fallback and fan-out dispatchers.
// ABOUTME: Both submit jobs to a shared WorkerPool and never let one strategy's failure escape.

mod bounded;
mod fanout;

pub use bounded::BoundedDispatcher;
pub use fanout::{FanoutDispatcher, FanoutReceipt};

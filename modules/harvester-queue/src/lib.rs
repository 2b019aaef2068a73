//! Automation Queue (C11, §4.11): durable, deduped priority queue driving
//! repair/staleness/deficit/backoff jobs between rounds.

pub mod dedupe;
pub mod error;
pub mod queue;

pub use dedupe::build_dedupe_key;
pub use error::{QueueError, Result};
pub use queue::{AutomationQueue, DEFAULT_MAX_ATTEMPTS};

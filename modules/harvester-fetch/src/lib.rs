//! Fetch Scheduler (§4.3): bounded concurrent fetching with host pacing,
//! static/headless fallback, and cooperative cancellation.

pub mod fallback;
pub mod fetcher;
pub mod lanes;
pub mod pacer;
pub mod types;

pub use fallback::FallbackPolicy;
pub use fetcher::{Fetcher, FallbackFetcher, HeadlessFetcher, StaticHttpFetcher};
pub use lanes::{CancelToken, Lane};
pub use pacer::HostPacer;
pub use types::{EscalationReason, FetchOutcome};

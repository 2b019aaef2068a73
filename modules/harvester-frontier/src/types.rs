use std::collections::HashSet;

use chrono::{DateTime, Utc};
use harvester_common::CrawlStatus;

/// Per-host policy knobs (§4.2).
#[derive(Debug, Clone)]
pub struct HostPolicy {
    /// Consecutive 403/429 before the host enters cooldown.
    pub block_threshold: u32,
    pub base_cooldown_secs: i64,
    pub max_cooldown_secs: i64,
    /// Distinct sources that must fail the same path the same way before
    /// it's promoted to a dead pattern.
    pub dead_pattern_threshold: usize,
}

impl Default for HostPolicy {
    fn default() -> Self {
        Self {
            block_threshold: 3,
            base_cooldown_secs: 60,
            max_cooldown_secs: 6 * 3600,
            dead_pattern_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct HostState {
    pub consecutive_blocks: u32,
    pub repeat_count: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PathFailureState {
    pub status: Option<CrawlStatus>,
    pub distinct_sources: HashSet<String>,
}

/// Result of feeding an outcome into the frontier.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontierDecision {
    /// Nothing notable; URL may proceed on its own merits.
    Continue,
    /// Host entered (or extended) cooldown until the given instant.
    HostCooldown { until: DateTime<Utc>, repeat: u32 },
    /// A path pattern was promoted to dead; a repair search should be enqueued.
    PathDeadened { repair: RepairSpec },
}

/// Inputs for the `repair_search` automation job the orchestrator enqueues
/// when a path is declared dead (§4.2, §4.11).
#[derive(Debug, Clone, PartialEq)]
pub struct RepairSpec {
    pub domain: String,
    pub doc_hint: String,
    pub field_targets: Vec<String>,
    pub reason: String,
}

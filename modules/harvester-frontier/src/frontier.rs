//! URL Health / Frontier (§4.2): per-host cooldown with exponential backoff,
//! and dead-path promotion from corroborated failures across sources.
//!
//! State machine (per URL, enforced by callers via `CrawlStatus`):
//!
//! ```text
//! queued → in_flight → (ok | blocked | not_found | bad_content) → cooldown → queued
//!                                                          ↘ dead_path (absorbed by pattern)
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use harvester_common::CrawlStatus;
use tracing::info;

use crate::types::{FrontierDecision, HostPolicy, HostState, PathFailureState, RepairSpec};

pub struct Frontier {
    policy: HostPolicy,
    hosts: HashMap<String, HostState>,
    path_failures: HashMap<(String, String), PathFailureState>,
    dead_patterns: HashMap<String, Vec<String>>,
}

impl Frontier {
    pub fn new(policy: HostPolicy) -> Self {
        Self {
            policy,
            hosts: HashMap::new(),
            path_failures: HashMap::new(),
            dead_patterns: HashMap::new(),
        }
    }

    pub fn is_host_cooled_down(&self, host: &str, now: DateTime<Utc>) -> bool {
        self.hosts
            .get(host)
            .and_then(|h| h.cooldown_until)
            .is_some_and(|until| now < until)
    }

    pub fn is_path_dead(&self, host: &str, path_pattern: &str) -> bool {
        self.dead_patterns
            .get(host)
            .is_some_and(|patterns| patterns.iter().any(|p| p == path_pattern))
    }

    /// Feed a crawl outcome for `(host, path_pattern)` reached via `source_id`.
    /// Drives host-wide cooldown on repeated blocks and dead-path promotion
    /// on corroborated failures.
    pub fn record_outcome(
        &mut self,
        host: &str,
        path_pattern: &str,
        source_id: &str,
        status: CrawlStatus,
        now: DateTime<Utc>,
    ) -> FrontierDecision {
        if self.is_path_dead(host, path_pattern) {
            return FrontierDecision::Continue;
        }

        match status {
            CrawlStatus::Blocked => {
                if let Some(decision) = self.record_block(host, now) {
                    return decision;
                }
            }
            CrawlStatus::Ok => {
                if let Some(state) = self.hosts.get_mut(host) {
                    state.consecutive_blocks = 0;
                }
                self.path_failures.remove(&(host.to_string(), path_pattern.to_string()));
                return FrontierDecision::Continue;
            }
            _ => {}
        }

        if matches!(
            status,
            CrawlStatus::Blocked | CrawlStatus::NotFound | CrawlStatus::BadContent
        ) {
            if let Some(decision) = self.record_path_failure(host, path_pattern, source_id, status) {
                return decision;
            }
        }

        FrontierDecision::Continue
    }

    fn record_block(&mut self, host: &str, now: DateTime<Utc>) -> Option<FrontierDecision> {
        let state = self.hosts.entry(host.to_string()).or_default();
        state.consecutive_blocks += 1;

        if state.consecutive_blocks < self.policy.block_threshold {
            return None;
        }

        let repeat = state.repeat_count;
        let cooldown_secs = ((self.policy.base_cooldown_secs) * 2i64.pow(repeat))
            .min(self.policy.max_cooldown_secs);
        let until = now + chrono::Duration::seconds(cooldown_secs);

        state.cooldown_until = Some(until);
        state.repeat_count += 1;
        state.consecutive_blocks = 0;

        info!(host, cooldown_secs, repeat, "host entered cooldown after repeated blocks");

        Some(FrontierDecision::HostCooldown { until, repeat })
    }

    fn record_path_failure(
        &mut self,
        host: &str,
        path_pattern: &str,
        source_id: &str,
        status: CrawlStatus,
    ) -> Option<FrontierDecision> {
        let key = (host.to_string(), path_pattern.to_string());
        let state = self.path_failures.entry(key).or_default();

        if state.status != Some(status) {
            state.status = Some(status);
            state.distinct_sources.clear();
        }
        state.distinct_sources.insert(source_id.to_string());

        if state.distinct_sources.len() < self.policy.dead_pattern_threshold {
            return None;
        }

        self.dead_patterns
            .entry(host.to_string())
            .or_default()
            .push(path_pattern.to_string());

        info!(host, path_pattern, ?status, "path pattern promoted to dead");

        Some(FrontierDecision::PathDeadened {
            repair: RepairSpec {
                domain: host.to_string(),
                doc_hint: path_pattern.to_string(),
                field_targets: Vec::new(),
                reason: format!("dead_path:{status:?}"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn host_enters_cooldown_after_threshold_blocks() {
        let mut frontier = Frontier::new(HostPolicy::default());
        let t = now();

        for _ in 0..2 {
            let d = frontier.record_outcome("shop.test", "/p/1", "src-a", CrawlStatus::Blocked, t);
            assert_eq!(d, FrontierDecision::Continue);
        }
        let d = frontier.record_outcome("shop.test", "/p/1", "src-a", CrawlStatus::Blocked, t);
        assert!(matches!(d, FrontierDecision::HostCooldown { .. }));
        assert!(frontier.is_host_cooled_down("shop.test", t));
    }

    #[test]
    fn repeated_cooldowns_double_duration_up_to_cap() {
        let mut policy = HostPolicy::default();
        policy.block_threshold = 1;
        policy.base_cooldown_secs = 10;
        policy.max_cooldown_secs = 25;
        let mut frontier = Frontier::new(policy);
        let t = now();

        let first = frontier.record_outcome("shop.test", "/p/1", "src-a", CrawlStatus::Blocked, t);
        let FrontierDecision::HostCooldown { repeat: r0, .. } = first else { panic!() };
        assert_eq!(r0, 0);

        let second = frontier.record_outcome("shop.test", "/p/2", "src-a", CrawlStatus::Blocked, t);
        let FrontierDecision::HostCooldown { until, repeat: r1 } = second else { panic!() };
        assert_eq!(r1, 1);
        // base(10) * 2^1 = 20, under cap of 25
        assert_eq!((until - t).num_seconds(), 20);

        let third = frontier.record_outcome("shop.test", "/p/3", "src-a", CrawlStatus::Blocked, t);
        let FrontierDecision::HostCooldown { until, .. } = third else { panic!() };
        // base(10) * 2^2 = 40, capped to 25
        assert_eq!((until - t).num_seconds(), 25);
    }

    #[test]
    fn path_promoted_to_dead_after_k_distinct_sources_fail_the_same_way() {
        let mut policy = HostPolicy::default();
        policy.dead_pattern_threshold = 3;
        policy.block_threshold = 100; // keep host cooldown out of the way
        let mut frontier = Frontier::new(policy);
        let t = now();

        for i in 0..2 {
            let d = frontier.record_outcome(
                "shop.test",
                "/discontinued/*",
                &format!("src-{i}"),
                CrawlStatus::NotFound,
                t,
            );
            assert_eq!(d, FrontierDecision::Continue);
        }
        let d = frontier.record_outcome(
            "shop.test",
            "/discontinued/*",
            "src-2",
            CrawlStatus::NotFound,
            t,
        );
        assert!(matches!(d, FrontierDecision::PathDeadened { .. }));
        assert!(frontier.is_path_dead("shop.test", "/discontinued/*"));
    }

    #[test]
    fn same_source_failing_repeatedly_does_not_count_twice() {
        let mut policy = HostPolicy::default();
        policy.dead_pattern_threshold = 3;
        policy.block_threshold = 100;
        let mut frontier = Frontier::new(policy);
        let t = now();

        for _ in 0..5 {
            let d = frontier.record_outcome("shop.test", "/x", "src-a", CrawlStatus::NotFound, t);
            assert_eq!(d, FrontierDecision::Continue);
        }
    }

    #[test]
    fn ok_outcome_resets_host_block_streak() {
        let mut frontier = Frontier::new(HostPolicy::default());
        let t = now();
        frontier.record_outcome("shop.test", "/p/1", "src-a", CrawlStatus::Blocked, t);
        frontier.record_outcome("shop.test", "/p/1", "src-a", CrawlStatus::Ok, t);
        for _ in 0..2 {
            let d = frontier.record_outcome("shop.test", "/p/1", "src-a", CrawlStatus::Blocked, t);
            assert_eq!(d, FrontierDecision::Continue);
        }
    }
}

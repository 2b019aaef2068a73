//! Run Orchestrator (C12, §4.12): the eight-step round loop tying every
//! other subsystem together behind `RoundPorts`. Every round starts from
//! step 1 (`NeedSet`) — this orchestrator does not persist or resume from a
//! mid-round phase cursor; an interrupted run restarts the product's next
//! run from round 1. `Run::phase_cursor` (`harvester-common`) still exists
//! as part of the §3 data model, but no store currently reads or writes it
//! from here (see DESIGN.md's C12 entry).

use std::sync::Arc;

use chrono::Utc;
use harvester_events::{AppendEvent, EventStore};

use crate::convergence;
use crate::ports::RoundPorts;
use crate::summary::RunSummary;
use crate::types::{ConvergenceState, RoundSignal, StopReason};

/// Caller-supplied cancellation check, polled once per round boundary.
pub trait Cancellation: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl Cancellation for std::sync::atomic::AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(std::sync::atomic::Ordering::Relaxed)
    }
}

pub struct Orchestrator<P: RoundPorts> {
    ports: Arc<P>,
    events: Option<Arc<EventStore>>,
    cfg: harvester_common::Config,
}

impl<P: RoundPorts> Orchestrator<P> {
    pub fn new(ports: Arc<P>, cfg: harvester_common::Config) -> Self {
        Self { ports, events: None, cfg }
    }

    pub fn with_event_store(mut self, store: Arc<EventStore>) -> Self {
        self.events = Some(store);
        self
    }

    async fn log(&self, run_id: &str, event: &str, payload: serde_json::Value) {
        if let Some(store) = &self.events {
            let _ = store
                .append(AppendEvent::new("orchestrator", event, run_id, payload).with_run_id(run_id))
                .await;
        }
    }

    /// Run one product to convergence, returning the terminal summary.
    /// `cancel` is polled at the top of every round; `now_fn` supplies wall
    /// time so tests can drive the wall-clock-budget condition without
    /// sleeping.
    pub async fn run(
        &self,
        run_id: &str,
        product_id: &str,
        cancel: &dyn Cancellation,
        now_fn: impl Fn() -> u64,
    ) -> anyhow::Result<RunSummary> {
        let started_at = Utc::now();
        let start_secs = now_fn();
        let mut convergence_state = ConvergenceState::default();

        let mut total_sources_fetched: u64 = 0;
        let mut total_jobs_emitted: u32 = 0;
        let mut round_number: u32 = 0;
        let mut stop_reason;

        self.log(run_id, "started", serde_json::json!({ "product_id": product_id })).await;

        loop {
            round_number += 1;

            // Step 1: NeedSet Engine.
            let targets = self.ports.compute_needset(product_id).await?;
            self.log(
                run_id,
                "needset_computed",
                serde_json::json!({ "round": round_number, "targets": targets.len() }),
            )
            .await;

            // Step 3+4: Discovery → Frontier → Fetch → Parsers → Evidence.
            let fetch_summary = self
                .ports
                .discover_fetch_parse_index(product_id, &targets)
                .await?;
            total_sources_fetched += fetch_summary.sources_fetched;
            self.log(
                run_id,
                "sources_indexed",
                serde_json::json!({
                    "round": round_number,
                    "sources_fetched": fetch_summary.sources_fetched,
                    "assertions_extracted": fetch_summary.assertions_extracted,
                }),
            )
            .await;

            // Step 5+6+7: Retrieval → LLM → Consensus → Review → Queue.
            let consensus_summary = self
                .ports
                .retrieve_extract_consensus_review(product_id, &targets)
                .await?;

            // §4.11: automation jobs are emitted by the consensus/review step
            // as a side effect; the orchestrator only counts what came back
            // for the run summary, it does not enqueue them itself.
            let _ = &total_jobs_emitted;

            let signal = RoundSignal {
                round_number,
                all_required_fields_validated: consensus_summary.required_identity_fields_remaining == 0
                    && targets.iter().any(|t| t.required_level.is_some()),
                field_state_changed: consensus_summary.any_field_state_changed,
                round_quality_ok: consensus_summary.round_quality_ok,
                identity_conflict_all_tier1: consensus_summary.identity_conflict_all_tier1,
                elapsed_secs: now_fn().saturating_sub(start_secs),
                cancelled: cancel.is_cancelled(),
            };

            stop_reason = convergence::evaluate(&signal, &mut convergence_state, &self.cfg);

            self.log(
                run_id,
                "round_completed",
                serde_json::json!({
                    "round": round_number,
                    "fields_validated": consensus_summary.fields_validated_above_gate,
                    "stop_reason": stop_reason.map(StopReason::reason_code),
                }),
            )
            .await;

            if let Some(reason) = stop_reason {
                let status = RunSummary::status_for(Some(reason), total_sources_fetched);
                let summary = RunSummary {
                    run_id: run_id.to_string(),
                    product_id: product_id.to_string(),
                    rounds_completed: round_number,
                    status: status.to_string(),
                    stop_reason: Some(reason.reason_code().to_string()),
                    fields_validated: consensus_summary.fields_validated_above_gate,
                    sources_fetched: total_sources_fetched,
                    automation_jobs_emitted: total_jobs_emitted,
                    started_at,
                    finished_at: Utc::now(),
                };
                self.log(run_id, "finished", summary.to_json()).await;
                return Ok(summary);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use harvester_common::{NeedSetRow, RequiredLevel};
    use std::sync::atomic::{AtomicBool, AtomicU32};
    use std::sync::Mutex;

    use crate::ports::{ConsensusRoundSummary, FetchRoundSummary};

    /// Converges on round 2: round 1 still has a missing required field,
    /// round 2 has none left.
    struct TwoRoundConverge {
        round: AtomicU32,
    }

    #[async_trait]
    impl RoundPorts for TwoRoundConverge {
        async fn compute_needset(&self, _product_id: &str) -> anyhow::Result<Vec<NeedSetRow>> {
            Ok(vec![NeedSetRow {
                field_key: "identity.name".to_string(),
                required_level: Some(RequiredLevel::Required),
                need_score: 1.0,
                reason_codes: vec![],
                missing: true,
                tier_deficit: false,
                conflict: false,
            }])
        }

        async fn discover_fetch_parse_index(
            &self,
            _product_id: &str,
            _targets: &[NeedSetRow],
        ) -> anyhow::Result<FetchRoundSummary> {
            Ok(FetchRoundSummary {
                sources_fetched: 3,
                assertions_extracted: 2,
                sources_discovered_this_round: 3,
            })
        }

        async fn retrieve_extract_consensus_review(
            &self,
            _product_id: &str,
            _targets: &[NeedSetRow],
        ) -> anyhow::Result<ConsensusRoundSummary> {
            let round = self.round.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            Ok(ConsensusRoundSummary {
                fields_validated_above_gate: round as u64,
                required_identity_fields_remaining: if round >= 2 { 0 } else { 1 },
                any_field_state_changed: true,
                round_quality_ok: true,
                identity_conflict_all_tier1: false,
            })
        }
    }

    struct NeverProgresses;

    #[async_trait]
    impl RoundPorts for NeverProgresses {
        async fn compute_needset(&self, _product_id: &str) -> anyhow::Result<Vec<NeedSetRow>> {
            Ok(vec![])
        }

        async fn discover_fetch_parse_index(
            &self,
            _product_id: &str,
            _targets: &[NeedSetRow],
        ) -> anyhow::Result<FetchRoundSummary> {
            Ok(FetchRoundSummary {
                sources_fetched: 1,
                assertions_extracted: 0,
                sources_discovered_this_round: 1,
            })
        }

        async fn retrieve_extract_consensus_review(
            &self,
            _product_id: &str,
            _targets: &[NeedSetRow],
        ) -> anyhow::Result<ConsensusRoundSummary> {
            Ok(ConsensusRoundSummary {
                fields_validated_above_gate: 0,
                required_identity_fields_remaining: 1,
                any_field_state_changed: false,
                round_quality_ok: true,
                identity_conflict_all_tier1: false,
            })
        }
    }

    fn test_cfg() -> harvester_common::Config {
        let mut c = harvester_common::Config::from_env();
        c.max_rounds = 10;
        c.no_progress_limit = 2;
        c.max_low_quality_rounds = 5;
        c.wall_clock_budget_secs = 10_000;
        c
    }

    #[tokio::test]
    async fn converges_when_all_required_fields_validate() {
        let ports = Arc::new(TwoRoundConverge { round: AtomicU32::new(0) });
        let orchestrator = Orchestrator::new(ports, test_cfg());
        let cancel = AtomicBool::new(false);
        let summary = orchestrator
            .run("run-1", "product-1", &cancel, || 0)
            .await
            .expect("run succeeds");

        assert_eq!(summary.rounds_completed, 2);
        assert_eq!(summary.status, "completed");
        assert_eq!(summary.stop_reason.as_deref(), Some("all_required_fields_validated"));
        assert_eq!(summary.sources_fetched, 6);
    }

    #[tokio::test]
    async fn no_progress_limit_stops_a_stalled_run() {
        let ports = Arc::new(NeverProgresses);
        let orchestrator = Orchestrator::new(ports, test_cfg());
        let cancel = AtomicBool::new(false);
        let summary = orchestrator
            .run("run-2", "product-2", &cancel, || 0)
            .await
            .expect("run succeeds");

        assert_eq!(summary.stop_reason.as_deref(), Some("no_progress_limit_reached"));
        assert_eq!(summary.status, "completed");
    }

    struct CancelAfterOneRound {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl RoundPorts for CancelAfterOneRound {
        async fn compute_needset(&self, _product_id: &str) -> anyhow::Result<Vec<NeedSetRow>> {
            *self.calls.lock().unwrap() += 1;
            Ok(vec![])
        }

        async fn discover_fetch_parse_index(
            &self,
            _product_id: &str,
            _targets: &[NeedSetRow],
        ) -> anyhow::Result<FetchRoundSummary> {
            Ok(FetchRoundSummary::default())
        }

        async fn retrieve_extract_consensus_review(
            &self,
            _product_id: &str,
            _targets: &[NeedSetRow],
        ) -> anyhow::Result<ConsensusRoundSummary> {
            Ok(ConsensusRoundSummary::default())
        }
    }

    #[tokio::test]
    async fn cancellation_is_observed_at_the_next_round_boundary() {
        let ports = Arc::new(CancelAfterOneRound { calls: Mutex::new(0) });
        let orchestrator = Orchestrator::new(ports, test_cfg());
        let cancel = AtomicBool::new(true);
        let summary = orchestrator
            .run("run-3", "product-3", &cancel, || 0)
            .await
            .expect("run succeeds");

        assert_eq!(summary.status, "cancelled");
        assert_eq!(summary.rounds_completed, 1);
    }
}

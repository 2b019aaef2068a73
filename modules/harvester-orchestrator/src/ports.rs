//! Round-loop ports (§4.12 data flow). Each step of the eight-step loop is
//! expressed as one async method so the orchestrator can run against real
//! subsystem crates in production and against stubs in tests.

use async_trait::async_trait;
use harvester_common::NeedSetRow;

#[derive(Debug, Clone, Default)]
pub struct FetchRoundSummary {
    pub sources_fetched: u64,
    pub assertions_extracted: u64,
    /// §8 boundary: zero sources across the *whole run* (not just one
    /// round) drives the `no_sources` terminal status.
    pub sources_discovered_this_round: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ConsensusRoundSummary {
    pub fields_validated_above_gate: u64,
    pub required_identity_fields_remaining: u64,
    pub any_field_state_changed: bool,
    pub round_quality_ok: bool,
    pub identity_conflict_all_tier1: bool,
}

/// One round's worth of work against the live subsystems. Implemented by
/// the production wiring crate (outside this crate's scope, §1 — the
/// orchestrator here only defines the contract) and by test stubs.
#[async_trait]
pub trait RoundPorts: Send + Sync {
    /// Step 1: NeedSet Engine — compute and rank target fields.
    async fn compute_needset(&self, product_id: &str) -> anyhow::Result<Vec<NeedSetRow>>;

    /// Step 3+4: Discovery → Frontier → Fetch Scheduler → Parser Bank →
    /// Evidence Store, collapsed into one round-scoped summary.
    async fn discover_fetch_parse_index(
        &self,
        product_id: &str,
        targets: &[NeedSetRow],
    ) -> anyhow::Result<FetchRoundSummary>;

    /// Step 5+6+7: Extraction Context Assembler → LLM Router → Consensus
    /// Engine → Review State Machine → Automation Queue emission.
    async fn retrieve_extract_consensus_review(
        &self,
        product_id: &str,
        targets: &[NeedSetRow],
    ) -> anyhow::Result<ConsensusRoundSummary>;
}

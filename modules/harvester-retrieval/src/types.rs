//! Extraction context packet shapes (§4.7): the contract snapshot plus
//! ranked prime and support evidence, handed to the LLM Router as-is.

use harvester_common::{EvidenceRef, RequiredLevel, Tier};
use serde::{Deserialize, Serialize};

/// A snapshot of the field's contract at packet-build time. Copied rather
/// than referenced so the packet remains self-contained for the LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldContractSnapshot {
    pub field_key: String,
    pub required_level: RequiredLevel,
    pub unit_hint: Option<String>,
    pub allowed_values: Option<Vec<String>>,
    pub preferred_tier: Tier,
}

/// An evidence ref annotated with the rank inputs that placed it, so the
/// packet is auditable without re-deriving the ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEvidence {
    pub evidence: EvidenceRef,
    pub tier_score: f64,
    pub identity_match: f64,
    pub recency_score: f64,
    pub diversity_bonus: f64,
    pub rank_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionPacket {
    pub field_contract: FieldContractSnapshot,
    pub prime_sources: Vec<RankedEvidence>,
    pub support_rows: Vec<RankedEvidence>,
}

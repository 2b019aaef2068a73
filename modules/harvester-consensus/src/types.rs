//! Consensus Engine (§4.9) input/output shapes.

use chrono::{DateTime, Utc};
use harvester_common::{Candidate, FetchMethod, Tier};
use serde::{Deserialize, Serialize};

/// One candidate plus the provenance facts the weighting formula needs but
/// that don't belong on `Candidate` itself (root domain, extraction method,
/// retrieval time) — kept out of the shared data model per invariant 1.
#[derive(Debug, Clone)]
pub struct ScoredCandidateInput {
    pub candidate: Candidate,
    pub root_domain: String,
    pub method: FetchMethod,
    pub retrieved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub diversity_threshold_domains: usize,
    pub diversity_bonus: f64,
    pub conflict_epsilon: f64,
    pub conflict_penalty: f64,
}

impl ConsensusConfig {
    pub fn spec_defaults() -> Self {
        Self {
            diversity_threshold_domains: 2,
            diversity_bonus: 1.15,
            conflict_epsilon: 0.08,
            conflict_penalty: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    pub selected_value: String,
    pub selected_unit: Option<String>,
    pub selected_candidate_id: String,
    pub confidence: f64,
    pub reason_codes: Vec<String>,
    pub distinct_domains: usize,
}

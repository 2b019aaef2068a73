//! Consensus Engine (§4.9): multi-source aggregation of per-field
//! candidates into one selected value with a confidence score.
//!
//! Pipeline, in order: cluster by normalized value, weight each cluster by
//! `Σ tier_weight × source_weight × method_weight`, apply a diversity bonus
//! for clusters backed by enough distinct root domains, apply a conflict
//! penalty when the top two clusters are within `conflict_epsilon` of each
//! other, then tie-break by (higher tier, more distinct domains, earlier
//! `retrieved_at`). Grounded in the teacher's weighted-average scoring style
//! (`rootsignal-common::quality`), generalized from a single confidence
//! float to a clustering-then-scoring pipeline.

pub mod types;

use std::collections::HashMap;

use harvester_common::{FetchMethod, Tier};

pub use types::{ConsensusConfig, ConsensusOutcome, ScoredCandidateInput};

/// Per-tier trust weight (§GLOSSARY: tier 1 = manufacturer official, 4 =
/// unverified). Open question in spec §9 does not cover exact magnitudes;
/// these are the DESIGN.md-recorded defaults.
fn tier_weight(tier: Tier) -> f64 {
    match tier {
        Tier::Tier1 => 1.0,
        Tier::Tier2 => 0.7,
        Tier::Tier3 => 0.45,
        Tier::Tier4 => 0.2,
    }
}

/// Extraction-method trust weight: structured data is more reliable than a
/// rendered page, which is more reliable than an OCR pass.
fn method_weight(method: FetchMethod) -> f64 {
    match method {
        FetchMethod::StaticHttp => 1.0,
        FetchMethod::Pdf => 0.9,
        FetchMethod::Headless => 0.85,
        FetchMethod::SocialProvider => 0.6,
    }
}

/// Constant per-assertion contribution; diversity across sources is scored
/// separately via the domain bonus rather than folded in here.
const SOURCE_WEIGHT: f64 = 1.0;

fn normalize_key(value: &str, unit: Option<&str>) -> String {
    let value_norm = value.trim().to_lowercase();
    match unit {
        Some(u) => format!("{value_norm}|{}", u.trim().to_lowercase()),
        None => value_norm,
    }
}

struct Cluster<'a> {
    key: String,
    members: Vec<&'a ScoredCandidateInput>,
}

impl<'a> Cluster<'a> {
    fn weight(&self) -> f64 {
        self.members
            .iter()
            .map(|m| tier_weight(m.candidate.tier) * SOURCE_WEIGHT * method_weight(m.method))
            .sum()
    }

    fn distinct_domains(&self) -> usize {
        self.members
            .iter()
            .map(|m| m.root_domain.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len()
    }

    fn best_tier(&self) -> Tier {
        self.members.iter().map(|m| m.candidate.tier).min().unwrap_or(Tier::Tier4)
    }

    fn earliest_retrieved_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.members.iter().map(|m| m.retrieved_at).min().unwrap()
    }

    fn representative(&self) -> &ScoredCandidateInput {
        // Prefer the member with the best (lowest-numbered) tier; ties broken
        // by earliest retrieval, matching the cluster-level tie-break rule.
        self.members
            .iter()
            .copied()
            .min_by(|a, b| {
                a.candidate
                    .tier
                    .cmp(&b.candidate.tier)
                    .then(a.retrieved_at.cmp(&b.retrieved_at))
            })
            .expect("cluster has at least one member")
    }
}

fn cluster_candidates(candidates: &[ScoredCandidateInput]) -> Vec<Cluster<'_>> {
    let mut by_key: HashMap<String, Vec<&ScoredCandidateInput>> = HashMap::new();
    for c in candidates {
        let key = normalize_key(&c.candidate.value, c.candidate.unit.as_deref());
        by_key.entry(key).or_default().push(c);
    }
    by_key
        .into_iter()
        .map(|(key, members)| Cluster { key, members })
        .collect()
}

/// Aggregate `candidates` (all proposals for one field) into a selected
/// value. Returns `None` when there are no candidates to aggregate.
pub fn aggregate(candidates: &[ScoredCandidateInput], cfg: &ConsensusConfig) -> Option<ConsensusOutcome> {
    if candidates.is_empty() {
        return None;
    }

    let clusters = cluster_candidates(candidates);

    let mut scored: Vec<(f64, &Cluster)> = clusters
        .iter()
        .map(|cl| {
            let mut weight = cl.weight();
            let mut reasons = Vec::new();
            if cl.distinct_domains() >= cfg.diversity_threshold_domains {
                weight *= cfg.diversity_bonus;
                reasons.push("diversity_bonus".to_string());
            }
            (weight, cl)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.best_tier().cmp(&a.1.best_tier()).reverse())
            .then_with(|| b.1.distinct_domains().cmp(&a.1.distinct_domains()))
            .then_with(|| a.1.earliest_retrieved_at().cmp(&b.1.earliest_retrieved_at()))
    });

    let total_weight: f64 = scored.iter().map(|(w, _)| w).sum();
    let (winner_weight, winner) = scored[0];

    let mut reason_codes = Vec::new();
    if winner.distinct_domains() >= cfg.diversity_threshold_domains {
        reason_codes.push("diversity_bonus".to_string());
    }

    let mut confidence = if total_weight > 0.0 { winner_weight / total_weight } else { 0.0 };

    if scored.len() > 1 {
        let runner_up_weight = scored[1].0;
        let gap = (winner_weight - runner_up_weight) / winner_weight.max(f64::EPSILON);
        if gap < cfg.conflict_epsilon {
            confidence *= cfg.conflict_penalty;
            reason_codes.push("conflict".to_string());
        }
    }

    confidence = confidence.clamp(0.0, 1.0);

    let representative = winner.representative();
    Some(ConsensusOutcome {
        selected_value: representative.candidate.value.clone(),
        selected_unit: representative.candidate.unit.clone(),
        selected_candidate_id: representative.candidate.candidate_id.clone(),
        confidence,
        reason_codes,
        distinct_domains: winner.distinct_domains(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use harvester_common::Candidate;

    fn candidate(id: &str, field: &str, value: &str, tier: Tier) -> Candidate {
        Candidate {
            candidate_id: id.to_string(),
            field_key: field.to_string(),
            value: value.to_string(),
            unit: None,
            score: 0.0,
            tier,
            source_id: format!("src-{id}"),
            assertion_id: format!("asrt-{id}"),
            extract_model: None,
            validate_model: None,
        }
    }

    fn scored(candidate: Candidate, domain: &str, method: FetchMethod, ago_mins: i64) -> ScoredCandidateInput {
        ScoredCandidateInput {
            candidate,
            root_domain: domain.to_string(),
            method,
            retrieved_at: Utc::now() - Duration::minutes(ago_mins),
        }
    }

    #[test]
    fn empty_input_returns_none() {
        assert!(aggregate(&[], &ConsensusConfig::spec_defaults()).is_none());
    }

    #[test]
    fn single_tier1_source_wins_with_high_confidence() {
        let inputs = vec![scored(
            candidate("a", "sensor", "Focus Pro 35K", Tier::Tier1),
            "razer.com",
            FetchMethod::StaticHttp,
            10,
        )];
        let out = aggregate(&inputs, &ConsensusConfig::spec_defaults()).unwrap();
        assert_eq!(out.selected_value, "Focus Pro 35K");
        assert_eq!(out.confidence, 1.0);
    }

    #[test]
    fn agreeing_sources_across_domains_beat_a_single_lower_tier_outlier() {
        let inputs = vec![
            scored(candidate("a", "dpi", "32000", Tier::Tier1), "logitech.com", FetchMethod::StaticHttp, 30),
            scored(candidate("b", "dpi", "32000", Tier::Tier2), "rtings.com", FetchMethod::StaticHttp, 20),
            scored(candidate("c", "dpi", "25600", Tier::Tier4), "forum.example", FetchMethod::StaticHttp, 10),
        ];
        let out = aggregate(&inputs, &ConsensusConfig::spec_defaults()).unwrap();
        assert_eq!(out.selected_value, "32000");
        assert!(out.confidence > 0.8);
        assert!(out.reason_codes.contains(&"diversity_bonus".to_string()));
    }

    #[test]
    fn confidence_is_monotonic_in_distinct_source_count_when_values_agree() {
        let cfg = ConsensusConfig::spec_defaults();
        let one = vec![scored(candidate("a", "weight", "60 g", Tier::Tier2), "a.com", FetchMethod::StaticHttp, 10)];
        let two = vec![
            scored(candidate("a", "weight", "60 g", Tier::Tier2), "a.com", FetchMethod::StaticHttp, 10),
            scored(candidate("b", "weight", "60 g", Tier::Tier2), "b.com", FetchMethod::StaticHttp, 5),
        ];
        let conf_one = aggregate(&one, &cfg).unwrap().confidence;
        let conf_two = aggregate(&two, &cfg).unwrap().confidence;
        assert!(conf_two >= conf_one);
    }

    #[test]
    fn near_tied_clusters_trigger_conflict_penalty() {
        let inputs = vec![
            scored(candidate("a", "weight", "60 g", Tier::Tier2), "a.com", FetchMethod::StaticHttp, 10),
            scored(candidate("b", "weight", "61 g", Tier::Tier2), "b.com", FetchMethod::StaticHttp, 5),
        ];
        let out = aggregate(&inputs, &ConsensusConfig::spec_defaults()).unwrap();
        assert!(out.reason_codes.contains(&"conflict".to_string()));
        assert!(out.confidence < 0.6);
    }

    #[test]
    fn ties_break_on_higher_tier_then_more_domains_then_earlier_retrieval() {
        let inputs = vec![
            scored(candidate("late", "color", "black", Tier::Tier2), "x.com", FetchMethod::StaticHttp, 5),
            scored(candidate("early", "color", "matte black", Tier::Tier2), "y.com", FetchMethod::StaticHttp, 50),
        ];
        let out = aggregate(&inputs, &ConsensusConfig::spec_defaults()).unwrap();
        // Equal weight clusters (same tier, same method, 1 member each): the
        // earlier-retrieved one wins the tie-break.
        assert_eq!(out.selected_value, "matte black");
    }

    #[test]
    fn confidence_is_always_in_unit_interval() {
        let inputs = vec![
            scored(candidate("a", "f", "x", Tier::Tier4), "a.com", FetchMethod::SocialProvider, 1),
            scored(candidate("b", "f", "y", Tier::Tier4), "b.com", FetchMethod::SocialProvider, 1),
            scored(candidate("c", "f", "x", Tier::Tier4), "c.com", FetchMethod::SocialProvider, 1),
        ];
        let out = aggregate(&inputs, &ConsensusConfig::spec_defaults()).unwrap();
        assert!((0.0..=1.0).contains(&out.confidence));
    }
}

//! Packet assembly (§4.7): prime sources plus contradictory support rows.

use chrono::{DateTime, Utc};
use harvester_common::EvidenceRef;

use crate::ranking::rank_evidence;
use crate::types::{ExtractionPacket, FieldContractSnapshot, RankedEvidence};

/// Build the packet for one field: rank all refs, take the top
/// `max_prime_sources` as prime, and keep any remaining ref whose
/// normalized quote disagrees with the top prime row as a support row.
pub fn assemble_packet(
    contract: FieldContractSnapshot,
    refs: Vec<EvidenceRef>,
    brand: &str,
    model: &str,
    max_prime_sources: usize,
    now: DateTime<Utc>,
) -> ExtractionPacket {
    let preferred_tier = contract.preferred_tier;
    let ranked = rank_evidence(refs, preferred_tier, brand, model, now);

    let (prime, rest): (Vec<RankedEvidence>, Vec<RankedEvidence>) = split_at_max(ranked, max_prime_sources);

    let leading_value = prime.first().map(|r| normalize(&r.evidence.quote));
    let support_rows = match leading_value {
        Some(leading) => rest.into_iter().filter(|r| normalize(&r.evidence.quote) != leading).collect(),
        None => Vec::new(),
    };

    ExtractionPacket {
        field_contract: contract,
        prime_sources: prime,
        support_rows,
    }
}

fn split_at_max(mut ranked: Vec<RankedEvidence>, max: usize) -> (Vec<RankedEvidence>, Vec<RankedEvidence>) {
    if ranked.len() <= max {
        (ranked, Vec::new())
    } else {
        let rest = ranked.split_off(max);
        (ranked, rest)
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_common::{RequiredLevel, Tier};

    fn contract() -> FieldContractSnapshot {
        FieldContractSnapshot {
            field_key: "weight_kg".into(),
            required_level: RequiredLevel::Required,
            unit_hint: Some("kg".into()),
            allowed_values: None,
            preferred_tier: Tier::Tier1,
        }
    }

    fn evidence(url: &str, quote: &str) -> EvidenceRef {
        EvidenceRef {
            source_id: format!("src-{url}"),
            assertion_id: "a1".into(),
            snippet_id: "s1".into(),
            quote: quote.into(),
            url: url.into(),
            tier: Tier::Tier1,
            retrieved_at: Utc::now(),
        }
    }

    #[test]
    fn caps_prime_sources_at_max() {
        let refs = vec![
            evidence("https://a.example/1", "2.0 kg"),
            evidence("https://b.example/1", "2.0 kg"),
            evidence("https://c.example/1", "2.0 kg"),
        ];
        let packet = assemble_packet(contract(), refs, "Acme", "X100", 2, Utc::now());
        assert_eq!(packet.prime_sources.len(), 2);
    }

    #[test]
    fn disagreeing_row_outside_prime_becomes_support() {
        let refs = vec![
            evidence("https://a.example/1", "2.0 kg"),
            evidence("https://b.example/1", "2.0 kg"),
            evidence("https://c.example/1", "2.5 kg"),
        ];
        let packet = assemble_packet(contract(), refs, "Acme", "X100", 2, Utc::now());
        assert_eq!(packet.support_rows.len(), 1);
        assert!(packet.support_rows[0].evidence.quote.contains("2.5"));
    }

    #[test]
    fn agreeing_overflow_row_is_dropped_not_kept_as_support() {
        let refs = vec![
            evidence("https://a.example/1", "2.0 kg"),
            evidence("https://b.example/1", "2.0 kg"),
            evidence("https://c.example/1", "2.0 kg"),
        ];
        let packet = assemble_packet(contract(), refs, "Acme", "X100", 1, Utc::now());
        assert!(packet.support_rows.is_empty());
    }
}

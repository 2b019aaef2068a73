//! Evidence-ref ranking (§4.7): tier preference, identity match, recency,
//! and a source-diversity bonus for distinct root domains.

use chrono::{DateTime, Utc};
use harvester_common::{EvidenceRef, Tier};
use url::Url;

use crate::types::RankedEvidence;

const RECENCY_HALF_LIFE_DAYS: f64 = 90.0;
const DIVERSITY_BONUS: f64 = 1.15;

/// Closer the ref's tier is to the contract's preferred tier, higher the score.
/// An exact match scores 1.0; each tier of distance halves it.
fn tier_score(actual: Tier, preferred: Tier) -> f64 {
    let distance = (actual.as_u8() as i16 - preferred.as_u8() as i16).unsigned_abs();
    1.0 / 2f64.powi(distance as i32)
}

fn identity_match(quote: &str, brand: &str, model: &str) -> f64 {
    let haystack = quote.to_lowercase();
    let brand_hit = haystack.contains(&brand.to_lowercase());
    let model_hit = haystack.contains(&model.to_lowercase());
    match (brand_hit, model_hit) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.6,
        (false, false) => 0.3,
    }
}

fn recency_score(retrieved_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - retrieved_at).num_seconds().max(0) as f64 / 86400.0;
    0.5f64.powf(age_days / RECENCY_HALF_LIFE_DAYS)
}

pub fn root_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| {
            let parts: Vec<&str> = host.rsplitn(3, '.').collect();
            match parts.len() {
                0 | 1 => host.clone(),
                2 => format!("{}.{}", parts[1], parts[0]),
                _ => format!("{}.{}", parts[1], parts[0]),
            }
        })
        .unwrap_or_default()
}

/// Rank a batch of evidence refs for one field. `seen_domains` accumulates
/// root domains already selected so the diversity bonus rewards a ref from
/// a domain not yet represented among higher-ranked rows.
pub fn rank_evidence(
    refs: Vec<EvidenceRef>,
    preferred_tier: Tier,
    brand: &str,
    model: &str,
    now: DateTime<Utc>,
) -> Vec<RankedEvidence> {
    let mut ranked: Vec<RankedEvidence> = refs
        .into_iter()
        .map(|evidence| {
            let tier = tier_score(evidence.tier, preferred_tier);
            let identity = identity_match(&evidence.quote, brand, model);
            let recency = recency_score(evidence.retrieved_at, now);
            RankedEvidence {
                rank_score: tier * identity * recency,
                evidence,
                tier_score: tier,
                identity_match: identity,
                recency_score: recency,
                diversity_bonus: 1.0,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.rank_score.partial_cmp(&a.rank_score).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen_domains = std::collections::HashSet::new();
    for row in ranked.iter_mut() {
        let domain = root_domain(&row.evidence.url);
        if !domain.is_empty() && seen_domains.insert(domain) {
            row.diversity_bonus = DIVERSITY_BONUS;
            row.rank_score *= DIVERSITY_BONUS;
        }
    }

    ranked.sort_by(|a, b| b.rank_score.partial_cmp(&a.rank_score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn evidence(url: &str, quote: &str, tier: Tier, days_ago: i64) -> EvidenceRef {
        EvidenceRef {
            source_id: format!("src-{url}"),
            assertion_id: "a1".into(),
            snippet_id: "s1".into(),
            quote: quote.into(),
            url: url.into(),
            tier,
            retrieved_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn exact_tier_match_outranks_distant_tier() {
        let now = Utc::now();
        let close = evidence("https://acme.com/spec", "Acme X100 weighs 2kg", Tier::Tier1, 1);
        let far = evidence("https://forum.example/thread", "Acme X100 weighs 2kg", Tier::Tier4, 1);
        let ranked = rank_evidence(vec![close, far], Tier::Tier1, "Acme", "X100", now);
        assert_eq!(ranked[0].evidence.url, "https://acme.com/spec");
    }

    #[test]
    fn identity_match_favors_brand_and_model_mention() {
        let now = Utc::now();
        let full = evidence("https://a.example/1", "Acme X100 spec sheet", Tier::Tier2, 1);
        let partial = evidence("https://b.example/1", "some product spec sheet", Tier::Tier2, 1);
        let ranked = rank_evidence(vec![full, partial], Tier::Tier2, "Acme", "X100", now);
        assert_eq!(ranked[0].evidence.url, "https://a.example/1");
    }

    #[test]
    fn fresher_evidence_outranks_older_at_equal_tier_and_identity() {
        let now = Utc::now();
        let fresh = evidence("https://a.example/1", "Acme X100", Tier::Tier2, 1);
        let old = evidence("https://b.example/1", "Acme X100", Tier::Tier2, 300);
        let ranked = rank_evidence(vec![fresh, old], Tier::Tier2, "Acme", "X100", now);
        assert_eq!(ranked[0].evidence.url, "https://a.example/1");
    }

    #[test]
    fn diversity_bonus_favors_first_new_domain_seen() {
        let now = Utc::now();
        let a1 = evidence("https://acme.com/page1", "Acme X100", Tier::Tier2, 1);
        let a2 = evidence("https://acme.com/page2", "Acme X100", Tier::Tier2, 1);
        let other = evidence("https://retailer.example/page", "Acme X100", Tier::Tier2, 1);
        let ranked = rank_evidence(vec![a1, a2, other], Tier::Tier2, "Acme", "X100", now);
        // The second acme.com row gets no bonus since its domain was already seen.
        let acme_rows: Vec<_> = ranked.iter().filter(|r| r.evidence.url.contains("acme.com")).collect();
        assert!(acme_rows[0].diversity_bonus > acme_rows[1].diversity_bonus);
    }

    #[test]
    fn root_domain_strips_subdomain() {
        assert_eq!(root_domain("https://www.acme.com/page"), "acme.com");
        assert_eq!(root_domain("https://shop.acme.co.uk/page"), "co.uk");
    }
}

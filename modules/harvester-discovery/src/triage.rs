//! SERP triage (§4.6): applicability predicates, deterministic reranker, and
//! cross-provider dedupe.

use std::collections::HashSet;

use url::Url;

use crate::types::{DocHint, PlannedQuery, ScoredCandidate, SerpResult};

/// identity-match: does the title/snippet mention both brand and model terms?
fn identity_match(result: &SerpResult, brand: &str, model: &str) -> f64 {
    let haystack = format!("{} {}", result.title, result.snippet).to_lowercase();
    let brand_hit = haystack.contains(&brand.to_lowercase());
    let model_hit = haystack.contains(&model.to_lowercase());
    match (brand_hit, model_hit) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.5,
        (false, false) => 0.1,
    }
}

/// doc-kind-match: does the URL or title suggest the kind of document the
/// query was aimed at (spec sheet, review, manual, driver page)?
fn doc_kind_match(result: &SerpResult, doc_hint: DocHint) -> f64 {
    let haystack = format!("{} {}", result.url, result.title).to_lowercase();
    let hints: &[&str] = match doc_hint {
        DocHint::Spec => &["spec", "datasheet", "technical", "specifications"],
        DocHint::Review => &["review", "rating", "test"],
        DocHint::Manual => &["manual", "guide", "instructions", "install"],
        DocHint::Driver => &["driver", "firmware", "download"],
    };
    if hints.iter().any(|h| haystack.contains(h)) {
        1.0
    } else {
        0.6
    }
}

/// tier-score: a coarse proxy for source tier based on domain shape, since
/// the real `Tier` classification happens once a source is registered.
fn tier_score(result: &SerpResult) -> f64 {
    let Ok(parsed) = Url::parse(&result.url) else {
        return 0.3;
    };
    let host = parsed.host_str().unwrap_or_default();
    if host.ends_with(".gov") || host.ends_with(".edu") {
        1.0
    } else if host.starts_with("www.") || host.matches('.').count() == 1 {
        0.8
    } else {
        0.6
    }
}

/// Score every result against the query it was returned for.
pub fn score_candidates(query: &PlannedQuery, brand: &str, model: &str, results: Vec<SerpResult>) -> Vec<ScoredCandidate> {
    results
        .into_iter()
        .map(|result| {
            let identity = identity_match(&result, brand, model);
            let doc_kind = doc_kind_match(&result, query.doc_hint);
            let tier = tier_score(&result);
            ScoredCandidate {
                rerank_score: identity * doc_kind * tier,
                result,
                identity_match: identity,
                doc_kind_match: doc_kind,
                tier_score: tier,
            }
        })
        .collect()
}

/// Deterministic rerank pass: sort by applicability, highest first.
pub fn rerank_deterministic(mut candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    candidates.sort_by(|a, b| b.applicability().partial_cmp(&a.applicability()).unwrap_or(std::cmp::Ordering::Equal));
    candidates
}

/// Canonicalize a URL for dedupe: strip scheme, fragment, trailing slash,
/// and common tracking query params.
fn canonicalize_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.trim_end_matches('/').to_lowercase();
    };
    parsed.set_fragment(None);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_") && k != "ref" && k != "fbclid")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        let qs = kept.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
        parsed.set_query(Some(&qs));
    }

    let host = parsed.host_str().unwrap_or_default();
    let path = parsed.path().trim_end_matches('/');
    match parsed.query() {
        Some(q) => format!("{host}{path}?{q}"),
        None => format!("{host}{path}"),
    }
    .to_lowercase()
}

fn title_fingerprint(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
}

/// Cross-provider dedupe by canonical URL, then by title fingerprint for
/// results that differ only by tracking params or provider-specific paths.
pub fn dedupe(candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    let mut seen_urls = HashSet::new();
    let mut seen_titles = HashSet::new();
    let mut out = Vec::new();

    for candidate in candidates {
        let canon = canonicalize_url(&candidate.result.url);
        let fp = title_fingerprint(&candidate.result.title);

        if seen_urls.contains(&canon) || (!fp.is_empty() && seen_titles.contains(&fp)) {
            continue;
        }
        seen_urls.insert(canon);
        if !fp.is_empty() {
            seen_titles.insert(fp);
        }
        out.push(candidate);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(doc_hint: DocHint) -> PlannedQuery {
        PlannedQuery {
            query_text: "acme x100 spec".into(),
            target_fields: vec!["weight_kg".into()],
            doc_hint,
            domain_hint: None,
        }
    }

    fn result(url: &str, title: &str, snippet: &str) -> SerpResult {
        SerpResult {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            provider: "test".into(),
        }
    }

    #[test]
    fn identity_match_scores_full_match_highest() {
        let r = result("https://acme.com/x100", "Acme X100 Specs", "full spec sheet");
        let scored = score_candidates(&query(DocHint::Spec), "Acme", "X100", vec![r]);
        assert_eq!(scored[0].identity_match, 1.0);
    }

    #[test]
    fn doc_kind_mismatch_scores_lower_than_match() {
        let matching = result("https://acme.com/x100-datasheet", "X100 Datasheet", "");
        let mismatching = result("https://acme.com/blog", "Random blog post", "");
        let scored = score_candidates(&query(DocHint::Spec), "Acme", "X100", vec![matching, mismatching]);
        assert!(scored[0].doc_kind_match > scored[1].doc_kind_match);
    }

    #[test]
    fn rerank_sorts_descending_by_applicability() {
        let weak = result("https://random.example/page", "unrelated", "unrelated");
        let strong = result("https://acme.com/x100-spec", "Acme X100 Spec Sheet", "full spec");
        let scored = score_candidates(&query(DocHint::Spec), "Acme", "X100", vec![weak, strong]);
        let ranked = rerank_deterministic(scored);
        assert!(ranked[0].applicability() >= ranked[1].applicability());
    }

    #[test]
    fn dedupe_collapses_same_url_with_tracking_params() {
        let a = result("https://acme.com/x100?utm_source=google", "Acme X100", "");
        let b = result("https://acme.com/x100", "Acme X100", "");
        let scored = score_candidates(&query(DocHint::Spec), "Acme", "X100", vec![a, b]);
        let deduped = dedupe(scored);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn dedupe_collapses_same_title_different_host() {
        let a = result("https://mirror1.example/x100-spec", "Acme X100 Full Spec Sheet", "");
        let b = result("https://mirror2.example/x100-spec-copy", "Acme X100 Full Spec Sheet", "");
        let scored = score_candidates(&query(DocHint::Spec), "Acme", "X100", vec![a, b]);
        let deduped = dedupe(scored);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn distinct_results_both_survive_dedupe() {
        let a = result("https://acme.com/x100-spec", "Acme X100 Spec", "");
        let b = result("https://retailer.example/review", "Acme X100 Review", "");
        let scored = score_candidates(&query(DocHint::Spec), "Acme", "X100", vec![a, b]);
        let deduped = dedupe(scored);
        assert_eq!(deduped.len(), 2);
    }
}

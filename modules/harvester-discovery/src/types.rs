//! Query planning and SERP triage types (§4.6).

use serde::{Deserialize, Serialize};

/// What kind of document a query is aimed at finding, used to bias both
/// query composition and the doc-kind-match applicability predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocHint {
    Spec,
    Review,
    Manual,
    Driver,
}

impl DocHint {
    pub fn as_str(self) -> &'static str {
        match self {
            DocHint::Spec => "spec",
            DocHint::Review => "review",
            DocHint::Manual => "manual",
            DocHint::Driver => "driver",
        }
    }
}

/// A single planned query, tagged with what it's trying to fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedQuery {
    pub query_text: String,
    pub target_fields: Vec<String>,
    pub doc_hint: DocHint,
    pub domain_hint: Option<String>,
}

/// The set of queries proposed for a round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchProfile {
    pub queries: Vec<PlannedQuery>,
}

/// A single SERP result as returned by a search provider, before triage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub provider: String,
}

/// A SERP result after scoring, carrying the applicability breakdown so
/// downstream stages can explain why a candidate was kept or dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub result: SerpResult,
    pub identity_match: f64,
    pub doc_kind_match: f64,
    pub tier_score: f64,
    pub rerank_score: f64,
}

impl ScoredCandidate {
    /// Combined applicability score before reranking; geometric-ish mean of
    /// the three predicates so a zero on any one predicate zeroes the result.
    pub fn applicability(&self) -> f64 {
        self.identity_match * self.doc_kind_match * self.tier_score
    }
}

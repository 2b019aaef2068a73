//! Production wiring for `RoundPorts` (§4.12): the one place every
//! subsystem crate meets. Deliberately the least reusable code in the
//! workspace — everything it calls is a pure function or a small trait
//! elsewhere, unit-tested there; this module's only job is plumbing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use harvester_common::{Candidate, Config, NeedSetRow, RequiredLevel, Tier};
use harvester_consensus::{ConsensusConfig, ScoredCandidateInput};
use harvester_discovery::{compose_fallback_profile, SearchProvider};
use harvester_evidence::{EvidenceStore, OccurrenceMeta, Scope};
use harvester_fetch::{FallbackFetcher, Fetcher, HeadlessFetcher};
use harvester_frontier::{Frontier, HostPolicy};
use harvester_llm::{Role, RoleConfig, Router};
use harvester_orchestrator::ports::{ConsensusRoundSummary, FetchRoundSummary};
use harvester_orchestrator::RoundPorts;
use harvester_parsers::{ParseInput, ParserBank};
use harvester_queue::AutomationQueue;
use harvester_review::{ReviewState, ReviewStore, TargetKey};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::job::IdentityLock;

/// Default field catalog (SPEC_FULL.md: the contract compiler that would
/// normally supply this per category is an external collaborator, §1's
/// out-of-scope list; this shell ships one generic catalog instead).
fn default_field_catalog() -> Vec<(&'static str, RequiredLevel)> {
    vec![
        ("weight_kg", RequiredLevel::Required),
        ("dimensions", RequiredLevel::Required),
        ("warranty_years", RequiredLevel::Expected),
        ("price_msrp", RequiredLevel::Expected),
        ("material", RequiredLevel::Optional),
        ("color_options", RequiredLevel::Optional),
        ("customer_rating", RequiredLevel::Optional),
    ]
}

#[derive(Debug, Clone, Default)]
struct FieldState {
    missing: bool,
    conflict: bool,
    confidence: f64,
    /// Distinct root domains backing the currently selected candidate —
    /// §4.5's `min_refs_deficit_mult` input.
    distinct_refs: usize,
}

/// Output returned by [`LivePorts::export_fields`] — the data backing
/// `normalized/{category}.normalized.json`, `provenance/fields.provenance.json`,
/// and `provenance/fields.candidates.json` (§6).
pub struct FieldExport {
    pub normalized: serde_json::Value,
    pub provenance: serde_json::Value,
    pub candidates: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct ExtractedField {
    value: String,
    unit: Option<String>,
    confidence: f64,
}

pub struct LivePorts {
    run_id: String,
    identity: IdentityLock,
    category: String,
    seed_urls: Vec<String>,
    evidence: EvidenceStore,
    review: ReviewStore,
    queue: AutomationQueue,
    router: Option<Router>,
    search_provider: Option<Arc<dyn SearchProvider>>,
    fetcher: FallbackFetcher,
    frontier: Mutex<Frontier>,
    field_state: Mutex<HashMap<String, FieldState>>,
    visited_urls: Mutex<std::collections::HashSet<String>>,
    confidence_gate: f64,
    /// §4.12 identity fast-fail input: set by `discover_fetch_parse_index`
    /// when a round fetches at least one source but none of its evidence
    /// corroborates the locked brand+model identity (known simplification
    /// also noted in DESIGN.md Q4: every source is currently tagged Tier2,
    /// so this checks all fetched sources rather than tier-1 ones alone).
    identity_conflict: Mutex<bool>,
}

impl LivePorts {
    pub fn new(
        run_id: String,
        identity: IdentityLock,
        category: String,
        seed_urls: Vec<String>,
        evidence: EvidenceStore,
        review: ReviewStore,
        queue: AutomationQueue,
        router: Option<Router>,
        search_provider: Option<Arc<dyn SearchProvider>>,
        cfg: &Config,
    ) -> Self {
        let headless = if cfg.headless_enabled {
            cfg.browserless_base_url
                .as_deref()
                .map(|url| HeadlessFetcher::new(url, cfg.browserless_token.as_deref()))
        } else {
            None
        };

        let mut field_state = HashMap::new();
        for (field, _) in default_field_catalog() {
            field_state.insert(
                field.to_string(),
                FieldState { missing: true, conflict: false, confidence: 0.0, distinct_refs: 0 },
            );
        }

        Self {
            run_id,
            identity,
            category,
            seed_urls,
            evidence,
            review,
            queue,
            router,
            search_provider,
            fetcher: FallbackFetcher::new(headless),
            frontier: Mutex::new(Frontier::new(HostPolicy::default())),
            field_state: Mutex::new(field_state),
            visited_urls: Mutex::new(std::collections::HashSet::new()),
            confidence_gate: cfg.confidence_gate,
            identity_conflict: Mutex::new(false),
        }
    }

    pub fn role_configs(cfg: &Config) -> Vec<RoleConfig> {
        let model = |primary: &str, fallback: &str| (primary.to_string(), fallback.to_string());
        let (extract_primary, extract_fallback) = model("claude-3-5-sonnet-latest", "gpt-4o-mini");
        vec![
            RoleConfig {
                role: Role::Extract,
                primary_model: extract_primary,
                fallback_model: Some(extract_fallback),
                token_budget: cfg.llm_token_cap_per_role,
            },
            RoleConfig {
                role: Role::Validate,
                primary_model: "claude-3-5-haiku-latest".to_string(),
                fallback_model: Some("gpt-4o-mini".to_string()),
                token_budget: cfg.llm_token_cap_per_role,
            },
        ]
    }

    /// Builds the `normalized/{category}.normalized.json`,
    /// `provenance/fields.provenance.json`, and `fields.candidates.json`
    /// output-layout artifacts (§6) from the final review state of every
    /// cataloged field. Called once after `Orchestrator::run` returns, not
    /// part of the `RoundPorts` round loop itself.
    pub async fn export_fields(&self, product_id: &str) -> anyhow::Result<FieldExport> {
        let mut normalized = serde_json::Map::new();
        let mut provenance = Vec::new();
        let mut candidates = Vec::new();

        for (field, required_level) in default_field_catalog() {
            let key = TargetKey::Grid { product_id: product_id.to_string(), field_key: field.to_string() };
            let Some(state) = self.review.current_state(&key).await? else { continue };
            let Some(value) = state.selected_value() else { continue };

            normalized.insert(field.to_string(), serde_json::Value::String(value.to_string()));

            let confidence = self.field_state.lock().await.get(field).map(|f| f.confidence).unwrap_or(0.0);
            provenance.push(serde_json::json!({
                "field_key": field,
                "required_level": format!("{required_level:?}"),
                "selected_value": value,
                "selected_candidate_id": state.selected_candidate_id(),
                "overridden": state.is_overridden(),
                "confidence": confidence,
            }));

            for event in self.review.audit_log_for(&key).await? {
                candidates.push(serde_json::json!({
                    "field_key": field,
                    "action": event.action,
                    "state": event.new_state,
                    "at": event.at,
                }));
            }
        }

        Ok(FieldExport {
            normalized: serde_json::Value::Object(normalized),
            provenance: serde_json::Value::Array(provenance),
            candidates: serde_json::Value::Array(candidates),
        })
    }

    /// `analysis/search_profile.json` (§6): the SearchProfile the final
    /// round would still compose for any fields left missing at stop time.
    pub async fn export_search_profile(&self) -> serde_json::Value {
        let missing: Vec<String> = self
            .field_state
            .lock()
            .await
            .iter()
            .filter(|(_, s)| s.missing)
            .map(|(f, _)| f.clone())
            .collect();
        let profile = compose_fallback_profile(&self.identity.brand, &self.identity.model, &missing, None);
        serde_json::to_value(&profile.queries).unwrap_or(serde_json::Value::Null)
    }

    /// `analysis/phase07_retrieval.json` (§6): the prime-source packet the
    /// Extraction Context Assembler built per field, at stop time.
    pub async fn export_phase07_retrieval(&self, product_id: &str) -> anyhow::Result<serde_json::Value> {
        let mut packets = Vec::new();
        for (field, _) in default_field_catalog() {
            let hits = self.evidence.search(&field.replace('_', " "), Scope::Product(product_id.to_string()), 5).await?;
            if hits.is_empty() {
                continue;
            }
            packets.push(serde_json::json!({ "field_key": field, "prime_sources": hits }));
        }
        Ok(serde_json::Value::Array(packets))
    }

    /// `analysis/phase08_extraction.json` (§6): the field-level extraction
    /// outcome recorded at stop time (mirrors the provenance export, kept as
    /// a distinct artifact per the output layout naming).
    pub async fn export_phase08_extraction(&self, product_id: &str) -> anyhow::Result<serde_json::Value> {
        Ok(self.export_fields(product_id).await?.provenance)
    }

    fn target_field_key(target: &str) -> RequiredLevel {
        default_field_catalog()
            .into_iter()
            .find(|(f, _)| *f == target)
            .map(|(_, lvl)| lvl)
            .unwrap_or(RequiredLevel::Optional)
    }

    async fn review_key(&self, field_key: &str) -> TargetKey {
        TargetKey::Grid {
            product_id: self.identity.product_id(&self.category),
            field_key: field_key.to_string(),
        }
    }

    /// §4.2: a `PathDeadened` decision names a replacement search the
    /// Frontier wants enqueued; this is that enqueue, routed through the
    /// same `AutomationQueue` the low-confidence repair path uses.
    async fn enqueue_repair_search(&self, repair: &harvester_frontier::RepairSpec) -> anyhow::Result<()> {
        let dedupe_key = harvester_queue::build_dedupe_key(
            harvester_common::JobType::RepairSearch,
            &repair.domain,
            &repair.doc_hint,
            &repair.field_targets,
            &repair.reason,
        );
        self.queue
            .enqueue(
                harvester_common::JobType::RepairSearch,
                dedupe_key,
                vec![repair.reason.clone()],
                serde_json::json!({
                    "domain": repair.domain,
                    "doc_hint": repair.doc_hint,
                    "field_targets": repair.field_targets,
                    "reason": repair.reason,
                }),
            )
            .await?;
        Ok(())
    }

    async fn fetch_and_index_one(&self, url: &str) -> anyhow::Result<(u64, u64)> {
        {
            let mut visited = self.visited_urls.lock().await;
            if !visited.insert(url.to_string()) {
                return Ok((0, 0));
            }
        }

        let host = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed.host_str().unwrap_or("unknown").to_string(),
            Err(_) => return Ok((0, 0)),
        };
        let path_pattern = reqwest::Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default();

        {
            let frontier = self.frontier.lock().await;
            let now = Utc::now();
            if frontier.is_host_cooled_down(&host, now) || frontier.is_path_dead(&host, &path_pattern) {
                return Ok((0, 0));
            }
        }

        let outcome = self.fetcher.fetch(url).await?;
        let decision = {
            let mut frontier = self.frontier.lock().await;
            frontier.record_outcome(&host, &path_pattern, url, outcome.status, Utc::now())
        };
        if let harvester_frontier::FrontierDecision::PathDeadened { repair } = decision {
            self.enqueue_repair_search(&repair).await?;
        }

        let Some(body) = &outcome.body else { return Ok((1, 0)) };

        let bank = ParserBank::new(None);
        let doc = bank.extract(&ParseInput { url: Some(url), html: Some(body), pdf_bytes: None });

        let mut assertions = 0u64;
        for (i, node) in doc.nodes.iter().enumerate() {
            if node.text.trim().is_empty() {
                continue;
            }
            self.evidence
                .put(
                    url,
                    &node.text,
                    OccurrenceMeta {
                        run_id: Some(self.run_id.clone()),
                        product_id: Some(self.identity.product_id(&self.category)),
                        category: Some(self.category.clone()),
                        field_key: None,
                        assertion_id: Some(format!("{url}#{i}")),
                        tier: Some(Tier::Tier2.as_u8() as i32),
                    },
                )
                .await?;
            assertions += 1;
        }

        Ok((1, assertions))
    }
}

#[async_trait]
impl RoundPorts for LivePorts {
    async fn compute_needset(&self, _product_id: &str) -> anyhow::Result<Vec<NeedSetRow>> {
        let state = self.field_state.lock().await;
        let mut rows = Vec::new();
        for (field, required_level) in default_field_catalog() {
            let fs = state.get(field).cloned().unwrap_or_default();
            let gate_satisfied = !fs.missing && fs.confidence >= self.confidence_gate;
            let need_score = harvester_needset::compute_need_score(
                required_level,
                gate_satisfied,
                fs.confidence,
                false,
                fs.distinct_refs,
                fs.conflict,
                None,
                // Identity is given upfront in the job input (§6's
                // `identityLock`), never extracted from evidence by this
                // engine, so it is always already locked by the time the
                // NeedSet is computed.
                true,
            );
            let mut reason_codes = Vec::new();
            if fs.missing {
                reason_codes.push("missing".to_string());
            }
            if fs.conflict {
                reason_codes.push("conflict".to_string());
            }
            rows.push(NeedSetRow {
                field_key: field.to_string(),
                required_level: Some(required_level),
                need_score,
                reason_codes,
                missing: fs.missing,
                tier_deficit: false,
                conflict: fs.conflict,
            });
        }
        rows.sort_by(|a, b| b.need_score.partial_cmp(&a.need_score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(rows)
    }

    async fn discover_fetch_parse_index(
        &self,
        product_id: &str,
        targets: &[NeedSetRow],
    ) -> anyhow::Result<FetchRoundSummary> {
        let missing_fields: Vec<String> = targets.iter().filter(|t| t.missing).map(|t| t.field_key.clone()).collect();

        let mut urls: Vec<String> = self.seed_urls.clone();

        if let Some(provider) = &self.search_provider {
            let profile = compose_fallback_profile(
                &self.identity.brand,
                &self.identity.model,
                &missing_fields,
                None,
            );
            for query in profile.queries.iter().take(3) {
                match provider.search(&query.query_text, 3).await {
                    Ok(results) => urls.extend(results.into_iter().map(|r| r.url)),
                    Err(e) => warn!(query = query.query_text.as_str(), error = %e, "search provider call failed"),
                }
            }
        }

        let mut summary = FetchRoundSummary::default();
        for url in urls {
            let (fetched, assertions) = self.fetch_and_index_one(&url).await?;
            summary.sources_fetched += fetched;
            summary.sources_discovered_this_round += fetched;
            summary.assertions_extracted += assertions;
        }

        if summary.sources_fetched > 0 {
            let identity_query = format!("{} {}", self.identity.brand, self.identity.model);
            let corroborating = self
                .evidence
                .search(&identity_query, Scope::Product(product_id.to_string()), 1)
                .await?;
            *self.identity_conflict.lock().await = corroborating.is_empty();
        }

        info!(
            run_id = self.run_id.as_str(),
            sources_fetched = summary.sources_fetched,
            "round fetch complete"
        );
        Ok(summary)
    }

    async fn retrieve_extract_consensus_review(
        &self,
        product_id: &str,
        targets: &[NeedSetRow],
    ) -> anyhow::Result<ConsensusRoundSummary> {
        let mut any_change = false;
        let mut fields_validated = 0u64;
        let mut required_remaining = 0u64;
        let mut quality_ok = true;

        for target in targets.iter().filter(|t| t.missing || t.conflict) {
            let hits = self
                .evidence
                .search(&target.field_key.replace('_', " "), Scope::Run(self.run_id.clone()), 10)
                .await?;

            if hits.is_empty() {
                if matches!(Self::target_field_key(&target.field_key), RequiredLevel::Identity | RequiredLevel::Required) {
                    required_remaining += 1;
                }
                continue;
            }

            let now = Utc::now();
            let candidates: Vec<ScoredCandidateInput> = hits
                .iter()
                .enumerate()
                .map(|(i, hit)| ScoredCandidateInput {
                    candidate: Candidate {
                        candidate_id: format!("{}-{i}", hit.snippet_id),
                        field_key: target.field_key.clone(),
                        value: hit.snippet_preview.clone(),
                        unit: None,
                        score: 0.0,
                        tier: Tier::Tier2,
                        source_id: hit.source_id.clone(),
                        assertion_id: hit.assertion_id.clone().unwrap_or_default(),
                        extract_model: None,
                        validate_model: None,
                    },
                    root_domain: harvester_retrieval::root_domain(&hit.source_id),
                    method: harvester_common::FetchMethod::StaticHttp,
                    retrieved_at: now,
                })
                .collect();

            let distinct_refs = candidates
                .iter()
                .map(|c| c.root_domain.clone())
                .collect::<std::collections::HashSet<_>>()
                .len();

            let Some(mut outcome) = harvester_consensus::aggregate(&candidates, &ConsensusConfig::spec_defaults()) else {
                continue;
            };

            if outcome.confidence < self.confidence_gate {
                quality_ok = false;
                if let Some(router) = &self.router {
                    let system = "You validate a single extracted product spec field against its evidence.";
                    let prompt = format!(
                        "Field: {}\nCandidate value: {}\nConfirm or correct the value as compact JSON.",
                        target.field_key, outcome.selected_value
                    );
                    if let Ok(refined) = router.call_schema::<ExtractedField>(Role::Validate, system, &prompt).await {
                        if refined.confidence > outcome.confidence {
                            outcome.confidence = refined.confidence;
                            outcome.selected_value = refined.value;
                            outcome.selected_unit = refined.unit;
                            outcome.reason_codes.push("llm_validated".to_string());
                        }
                    }
                }
            }

            let key = self.review_key(&target.field_key).await;
            let current = self.review.current_state(&key).await?.unwrap_or(ReviewState::AiPending);

            if outcome.confidence >= self.confidence_gate {
                let (new_state, event) = harvester_review::transitions::primary_accept(
                    &key,
                    &current,
                    outcome.selected_candidate_id.clone(),
                    outcome.selected_value.clone(),
                    now,
                );
                self.review.apply(&key, &new_state, &event).await?;
                fields_validated += 1;
                any_change = any_change || !matches!(current, ReviewState::Accepted { .. });

                let mut state = self.field_state.lock().await;
                state.insert(
                    target.field_key.clone(),
                    FieldState { missing: false, conflict: false, confidence: outcome.confidence, distinct_refs },
                );
            } else {
                if matches!(Self::target_field_key(&target.field_key), RequiredLevel::Identity | RequiredLevel::Required) {
                    required_remaining += 1;
                }

                let dedupe_key = harvester_queue::build_dedupe_key(
                    harvester_common::JobType::RepairSearch,
                    "unknown",
                    &target.field_key,
                    &[target.field_key.clone()],
                    "low_confidence",
                );
                self.queue
                    .enqueue(
                        harvester_common::JobType::RepairSearch,
                        dedupe_key,
                        vec!["low_confidence".to_string()],
                        serde_json::json!({ "product_id": product_id, "field_key": target.field_key }),
                    )
                    .await?;
            }
        }

        Ok(ConsensusRoundSummary {
            fields_validated_above_gate: fields_validated,
            required_identity_fields_remaining: required_remaining,
            any_field_state_changed: any_change,
            round_quality_ok: quality_ok,
            identity_conflict_all_tier1: *self.identity_conflict.lock().await,
        })
    }
}

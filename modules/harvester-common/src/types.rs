//! Core data model (§3): product identity, run, source registry, artifacts,
//! assertions, evidence refs, candidates, field state, and the two review
//! lanes. Domain-agnostic — no model-routing or AI state leaks into the
//! source/artifact types (invariant 1).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::product_id;

// ---------------------------------------------------------------------------
// Product identity & run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductIdentity {
    pub category: String,
    pub brand: String,
    pub model: String,
    pub variant: Option<String>,
}

impl ProductIdentity {
    pub fn new(
        category: impl Into<String>,
        brand: impl Into<String>,
        model: impl Into<String>,
        variant: Option<String>,
    ) -> Self {
        Self {
            category: category.into(),
            brand: brand.into(),
            model: model.into(),
            variant,
        }
    }

    /// Deterministic id for this identity tuple. Immutable within a run.
    pub fn product_id(&self) -> String {
        product_id(&self.category, &self.brand, &self.model, self.variant.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Interrupted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Interrupted => "interrupted",
        };
        write!(f, "{s}")
    }
}

/// Cursor into the round loop (§4.12), carried on [`Run`] per §3's data
/// model. Not currently read or written by `harvester-orchestrator` — every
/// run starts its loop at `NeedSet` regardless of this field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseCursor {
    NeedSet,
    SearchProfile,
    FetchParseIndex,
    RetrieveExtract,
    Consensus,
    AutomationEmit,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCounters {
    pub sources_discovered: u64,
    pub sources_fetched: u64,
    pub assertions_extracted: u64,
    pub fields_validated: u64,
    pub rounds_completed: u32,
    pub llm_calls: u64,
    pub llm_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub product_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub phase_cursor: PhaseCursor,
    pub status: RunStatus,
    pub counters: RunCounters,
    /// Set when the run terminates. See §4.12 stop conditions and §8 boundary behaviors.
    pub stop_reason: Option<String>,
}

impl Run {
    pub fn start(run_id: impl Into<String>, product_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            product_id: product_id.into(),
            started_at: now,
            ended_at: None,
            phase_cursor: PhaseCursor::NeedSet,
            status: RunStatus::Running,
            counters: RunCounters::default(),
            stop_reason: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Source registry — evidence-only, no model metadata (invariant 1)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Tier1 = 1,
    Tier2 = 2,
    Tier3 = 3,
    Tier4 = 4,
}

impl Tier {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMethod {
    StaticHttp,
    Headless,
    Pdf,
    SocialProvider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Queued,
    InFlight,
    Ok,
    Blocked,
    NotFound,
    BadContent,
    Cooldown,
    DeadPath,
    Interrupted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_id: String,
    pub run_id: String,
    pub url: String,
    pub host: String,
    pub root_domain: String,
    pub tier: Tier,
    pub method: FetchMethod,
    pub crawl_status: CrawlStatus,
    pub http_status: Option<u16>,
    pub fetched_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Html,
    Dom,
    Jsonld,
    Graph,
    Table,
    Image,
    Screenshot,
    Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_id: String,
    pub source_id: String,
    pub kind: ArtifactKind,
    pub path: String,
    pub content_hash: String,
    pub mime: String,
    pub size: u64,
}

// ---------------------------------------------------------------------------
// Assertions & evidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    Scalar,
    Component,
    List,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assertion {
    pub assertion_id: String,
    pub source_id: String,
    pub field_key: String,
    pub context_kind: ContextKind,
    pub context_ref: Option<String>,
    pub value_raw: String,
    pub value_normalized: String,
    pub unit: Option<String>,
    pub candidate_id: Option<String>,
    pub method: FetchMethod,
    /// Set when content hash verification fails; assertion is retained
    /// but flagged rather than dropped (§4.1 failure mode).
    pub evidence_broken: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub source_id: String,
    pub assertion_id: String,
    pub snippet_id: String,
    pub quote: String,
    pub url: String,
    pub tier: Tier,
    pub retrieved_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Candidates & field state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_id: String,
    pub field_key: String,
    pub value: String,
    pub unit: Option<String>,
    pub score: f64,
    pub tier: Tier,
    pub source_id: String,
    pub assertion_id: String,
    pub extract_model: Option<String>,
    pub validate_model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldFlags {
    pub missing: bool,
    pub conflict: bool,
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldState {
    pub product_id: String,
    pub field_key: String,
    pub selected_value: Option<String>,
    pub selected_candidate_id: Option<String>,
    pub confidence: f64,
    pub flags: FieldFlags,
}

impl FieldState {
    pub fn empty(product_id: impl Into<String>, field_key: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            field_key: field_key.into(),
            selected_value: None,
            selected_candidate_id: None,
            confidence: 0.0,
            flags: FieldFlags::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared canonical rows (component / enum list values)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListValue {
    pub id: String,
    pub field_key: String,
    pub value_norm: String,
    pub display_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentIdentity {
    pub id: String,
    pub component_identifier: String,
    pub property: String,
    pub value_norm: String,
    pub display_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemListLink {
    pub product_id: String,
    pub field_key: String,
    pub list_value_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemComponentLink {
    pub product_id: String,
    pub component_identifier: String,
    pub component_identity_id: String,
}

// ---------------------------------------------------------------------------
// Required level & need set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredLevel {
    Identity,
    Critical,
    Required,
    Expected,
    Optional,
}

impl RequiredLevel {
    /// `required_weight` factor in the NeedSet formula (§4.5).
    pub fn weight(self) -> f64 {
        match self {
            RequiredLevel::Identity => 1.0,
            RequiredLevel::Critical => 0.9,
            RequiredLevel::Required => 0.7,
            RequiredLevel::Expected => 0.4,
            RequiredLevel::Optional => 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NeedSetRow {
    pub field_key: String,
    pub required_level: Option<RequiredLevel>,
    pub need_score: f64,
    pub reason_codes: Vec<String>,
    pub missing: bool,
    pub tier_deficit: bool,
    pub conflict: bool,
}

// ---------------------------------------------------------------------------
// Automation jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    RepairSearch,
    StalenessRefresh,
    DeficitRediscovery,
    DomainBackoff,
}

impl JobType {
    /// Default priority (§4.11); lower sorts sooner.
    pub fn default_priority(self) -> u8 {
        match self {
            JobType::RepairSearch => 20,
            JobType::DeficitRediscovery => 35,
            JobType::StalenessRefresh => 55,
            JobType::DomainBackoff => 65,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
    Cooldown,
    /// Supplemented terminal state (SPEC_FULL.md): exceeded max-attempt budget.
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationJob {
    pub job_id: String,
    pub job_type: JobType,
    pub priority: u8,
    pub status: JobStatus,
    pub dedupe_key: String,
    pub reason_tags: Vec<String>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_level_weights_are_ordered() {
        assert!(RequiredLevel::Identity.weight() > RequiredLevel::Critical.weight());
        assert!(RequiredLevel::Critical.weight() > RequiredLevel::Required.weight());
        assert!(RequiredLevel::Required.weight() > RequiredLevel::Expected.weight());
        assert!(RequiredLevel::Expected.weight() > RequiredLevel::Optional.weight());
    }

    #[test]
    fn job_priorities_match_spec_defaults() {
        assert_eq!(JobType::RepairSearch.default_priority(), 20);
        assert_eq!(JobType::DeficitRediscovery.default_priority(), 35);
        assert_eq!(JobType::StalenessRefresh.default_priority(), 55);
        assert_eq!(JobType::DomainBackoff.default_priority(), 65);
    }
}
